use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration from config.toml in the data directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Change events this soon after one of our own saves are ignored.
    #[serde(default = "default_suppression_window_ms")]
    pub suppression_window_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        WatchConfig {
            suppression_window_ms: default_suppression_window_ms(),
        }
    }
}

impl WatchConfig {
    pub fn suppression_window(&self) -> Duration {
        Duration::from_millis(self.suppression_window_ms)
    }
}

fn default_suppression_window_ms() -> u64 {
    crate::io::watcher::DEFAULT_SUPPRESSION_WINDOW.as_millis() as u64
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Command used to open the task file externally. Falls back to
    /// $VISUAL, then $EDITOR, then `vi`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl EditorConfig {
    pub fn resolve(&self) -> String {
        self.resolve_with(std::env::var("VISUAL").ok(), std::env::var("EDITOR").ok())
    }

    /// Blank candidates are skipped, not taken as the answer.
    fn resolve_with(&self, visual: Option<String>, editor: Option<String>) -> String {
        [self.command.clone(), visual, editor]
            .into_iter()
            .flatten()
            .find(|c| !c.trim().is_empty())
            .unwrap_or_else(|| "vi".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    /// Section that quick capture appends to
    #[serde(default = "default_capture_section")]
    pub capture_section: String,
    /// Section completed tasks are moved into
    #[serde(default = "default_done_section")]
    pub done_section: String,
    /// Color overrides by theme slot name, as "#RRGGBB"
    #[serde(default)]
    pub colors: HashMap<String, String>,
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            capture_section: default_capture_section(),
            done_section: default_done_section(),
            colors: HashMap::new(),
        }
    }
}

fn default_capture_section() -> String {
    "Today".to_string()
}

fn default_done_section() -> String {
    "Done".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.watch.suppression_window(), Duration::from_millis(1000));
        assert_eq!(config.ui.capture_section, "Today");
        assert_eq!(config.ui.done_section, "Done");
        assert!(config.editor.command.is_none());
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config: Config = toml::from_str(
            r##"
[watch]
suppression_window_ms = 1500

[ui]
colors = { highlight = "#FF0000" }
"##,
        )
        .unwrap();
        assert_eq!(config.watch.suppression_window_ms, 1500);
        assert_eq!(config.ui.capture_section, "Today");
        assert_eq!(config.ui.colors["highlight"], "#FF0000");
    }

    #[test]
    fn configured_editor_wins() {
        let editor = EditorConfig {
            command: Some("hx".into()),
        };
        assert_eq!(editor.resolve(), "hx");
    }

    #[test]
    fn blank_candidates_fall_through() {
        let editor = EditorConfig { command: None };
        assert_eq!(
            editor.resolve_with(Some(String::new()), Some("nano".into())),
            "nano"
        );
        assert_eq!(editor.resolve_with(None, Some("  ".into())), "vi");
        assert_eq!(editor.resolve_with(None, None), "vi");

        let blank_command = EditorConfig {
            command: Some(" ".into()),
        };
        assert_eq!(
            blank_command.resolve_with(Some("code -w".into()), None),
            "code -w"
        );
    }
}
