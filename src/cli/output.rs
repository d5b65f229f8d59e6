use std::path::Path;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::io::recovery::RecoveryEntry;

/// Payload of `today show --json`.
#[derive(Serialize)]
pub struct DocumentJson<'a> {
    pub path: String,
    pub content: &'a str,
}

impl<'a> DocumentJson<'a> {
    pub fn new(path: &Path, content: &'a str) -> Self {
        DocumentJson {
            path: path.display().to_string(),
            content,
        }
    }
}

/// One line of `today watch --json`.
#[derive(Serialize)]
pub struct ChangeJson<'a> {
    pub changed_at: String,
    pub content: &'a str,
}

#[derive(Serialize)]
pub struct RecoveryEntryJson<'a> {
    pub timestamp: String,
    pub description: &'a str,
    pub fields: Vec<(&'a str, &'a str)>,
    pub body: &'a str,
}

impl<'a> From<&'a RecoveryEntry> for RecoveryEntryJson<'a> {
    fn from(entry: &'a RecoveryEntry) -> Self {
        RecoveryEntryJson {
            timestamp: entry.timestamp.to_rfc3339(),
            description: &entry.description,
            fields: entry
                .fields
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect(),
            body: &entry.body,
        }
    }
}

/// Header printed before each change in `today watch`.
pub fn format_change_header(at: DateTime<Local>) -> String {
    format!("--- changed at {} ---", at.format("%H:%M:%S"))
}

/// Human-readable recovery entry.
pub fn format_recovery_entry(entry: &RecoveryEntry) -> String {
    let mut out = format!(
        "{}  {}\n",
        entry.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        entry.description
    );
    for (key, value) in &entry.fields {
        out.push_str(&format!("  {}: {}\n", key, value));
    }
    for line in entry.body.lines() {
        out.push_str(&format!("  | {}\n", line));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn document_json_shape() {
        let json = serde_json::to_value(DocumentJson::new(Path::new("/h/.today/today.md"), "# Today\n"))
            .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"path": "/h/.today/today.md", "content": "# Today\n"})
        );
    }

    #[test]
    fn recovery_entry_text() {
        let entry = RecoveryEntry {
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            description: "task file write failed".into(),
            fields: vec![("Error".into(), "disk full".into())],
            body: "# Today\n- a\n".into(),
        };
        let text = format_recovery_entry(&entry);
        assert!(text.contains("task file write failed\n"));
        assert!(text.ends_with("  Error: disk full\n  | # Today\n  | - a\n"));
    }
}
