use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::warn;

/// Self-documenting header written at the top of a new recovery log.
const FILE_HEADER: &str = "\
<!-- today recovery log — content that could not be saved normally.
     If an edit went missing, check here.
     View with: today recovery
     Safe to delete if empty or stale. -->

---
";

/// A single entry in the recovery log.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub body: String,
}

/// Return the path to the recovery log file.
pub fn recovery_log_path(data_dir: &Path) -> PathBuf {
    data_dir.join(".recovery.log")
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl RecoveryEntry {
    /// Format this entry as a markdown block for the recovery log.
    fn to_markdown(&self) -> String {
        let mut out = format!(
            "## {} — write: {}\n\n",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            self.description,
        );

        for (key, value) in &self.fields {
            out.push_str(&format!("{}: {}\n", key, value));
        }

        if !self.body.is_empty() {
            out.push('\n');
            out.push_str("```text\n");
            out.push_str(&self.body);
            if !self.body.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("```\n");
        }

        out.push('\n');
        out.push_str("---\n");
        out
    }
}

/// Append a recovery entry to the log. Failures are logged and otherwise ignored.
pub fn log_recovery(data_dir: &Path, entry: RecoveryEntry) {
    if let Err(e) = log_recovery_inner(data_dir, &entry) {
        warn!(error = %e, "could not write to recovery log");
    }
}

fn log_recovery_inner(data_dir: &Path, entry: &RecoveryEntry) -> io::Result<()> {
    let path = recovery_log_path(data_dir);
    let needs_header = std::fs::metadata(&path).map_or(true, |m| m.len() == 0);

    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    if needs_header {
        file.write_all(FILE_HEADER.as_bytes())?;
    }
    file.write_all(entry.to_markdown().as_bytes())?;
    Ok(())
}

/// Read recovery entries, most recent first. A missing log reads as empty.
pub fn read_recovery_entries(data_dir: &Path) -> Vec<RecoveryEntry> {
    let content = match std::fs::read_to_string(recovery_log_path(data_dir)) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };
    let mut entries = parse_entries(&content);
    entries.reverse();
    entries
}

fn parse_entries(content: &str) -> Vec<RecoveryEntry> {
    let mut entries = Vec::new();
    let mut lines = content.lines().peekable();

    while let Some(line) = lines.next() {
        let Some(header) = line.strip_prefix("## ") else {
            continue;
        };
        let Some((timestamp, description)) = parse_entry_header(header) else {
            continue;
        };

        let mut fields = Vec::new();
        let mut body = String::new();
        let mut in_code_block = false;

        while let Some(&line) = lines.peek() {
            if !in_code_block && line.starts_with("## ") {
                // missing separator, leave the header for the outer loop
                break;
            }
            lines.next();
            if in_code_block {
                if line == "```" {
                    in_code_block = false;
                } else {
                    body.push_str(line);
                    body.push('\n');
                }
            } else if line == "---" {
                break;
            } else if line.starts_with("```") {
                in_code_block = true;
            } else if let Some((key, value)) = line.split_once(": ") {
                fields.push((key.to_string(), value.to_string()));
            }
        }

        entries.push(RecoveryEntry {
            timestamp,
            description,
            fields,
            body,
        });
    }

    entries
}

/// Parse `<rfc3339> — write: <description>`.
fn parse_entry_header(header: &str) -> Option<(DateTime<Utc>, String)> {
    let (ts, rest) = header.split_once(" — ")?;
    let timestamp = DateTime::parse_from_rfc3339(ts).ok()?.with_timezone(&Utc);
    let description = rest.strip_prefix("write: ").unwrap_or(rest);
    Some((timestamp, description.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn entry(minute: u32, body: &str) -> RecoveryEntry {
        RecoveryEntry {
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 9, minute, 0).unwrap(),
            description: "task file write failed".into(),
            fields: vec![("Error".into(), "disk full".into())],
            body: body.into(),
        }
    }

    #[test]
    fn atomic_write_replaces_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("today.md");
        std::fs::write(&path, "old").unwrap();
        atomic_write(&path, b"new content").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new content");
        // no stray temp files left behind
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn entry_markdown_layout() {
        let md = entry(5, "# Today\n- unsaved").to_markdown();
        assert_eq!(
            md,
            "## 2026-03-01T09:05:00Z — write: task file write failed\n\
             \n\
             Error: disk full\n\
             \n\
             ```text\n\
             # Today\n\
             - unsaved\n\
             ```\n\
             \n\
             ---\n"
        );
    }

    #[test]
    fn logged_entries_read_back_newest_first() {
        let tmp = TempDir::new().unwrap();
        log_recovery(tmp.path(), entry(1, "first\n"));
        log_recovery(tmp.path(), entry(2, "second\n"));

        let log = std::fs::read_to_string(recovery_log_path(tmp.path())).unwrap();
        assert!(log.starts_with("<!-- today recovery log"));
        assert_eq!(log.matches("today recovery log").count(), 1);

        let entries = read_recovery_entries(tmp.path());
        assert_eq!(entries, vec![entry(2, "second\n"), entry(1, "first\n")]);
    }

    #[test]
    fn missing_log_reads_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(read_recovery_entries(tmp.path()).is_empty());
    }

    #[test]
    fn body_may_contain_separator_lines() {
        let tmp = TempDir::new().unwrap();
        log_recovery(tmp.path(), entry(3, "above\n---\n## not a header\n"));
        let entries = read_recovery_entries(tmp.path());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].body, "above\n---\n## not a header\n");
    }
}
