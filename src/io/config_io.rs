use std::fs;
use std::path::{Path, PathBuf};

use crate::io::recovery::atomic_write;
use crate::model::config::Config;

/// Error type for config file operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config.toml: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not edit config.toml: {0}")]
    Edit(#[from] toml_edit::TomlError),
    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unknown config key '{0}'")]
    UnknownKey(String),
}

pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

/// Read the config, falling back to defaults when the file does not exist.
pub fn read_config(data_dir: &Path) -> Result<Config, ConfigError> {
    let path = config_path(data_dir);
    match fs::read_to_string(&path) {
        Ok(text) => Ok(toml::from_str(&text)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(ConfigError::Read { path, source: e }),
    }
}

/// Render the effective config as TOML.
pub fn render_config(config: &Config) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(config)?)
}

/// Set a dotted key (e.g. `watch.suppression_window_ms`) in config.toml,
/// keeping the rest of the file's formatting. The edited document must
/// still parse as a valid config before it is written.
pub fn set_config_value(data_dir: &Path, key: &str, raw_value: &str) -> Result<Config, ConfigError> {
    let path = config_path(data_dir);
    let text = match fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(ConfigError::Read { path, source: e }),
    };
    if !is_known_key(key) {
        return Err(ConfigError::UnknownKey(key.to_string()));
    }
    let base: toml_edit::DocumentMut = text.parse()?;

    // The first candidate the config accepts wins, so `2026` can still be
    // a section name.
    let mut first_err = None;
    let mut accepted = None;
    for value in candidate_values(raw_value) {
        let mut doc = base.clone();
        set_dotted(&mut doc, key, value)?;
        let updated = doc.to_string();
        match toml::from_str::<Config>(&updated) {
            Ok(config) => {
                accepted = Some((config, updated));
                break;
            }
            Err(e) => {
                first_err.get_or_insert(e);
            }
        }
    }
    let (config, updated) = match (accepted, first_err) {
        (Some(ok), _) => ok,
        (None, Some(e)) => return Err(e.into()),
        (None, None) => return Err(ConfigError::UnknownKey(key.to_string())),
    };

    fs::create_dir_all(data_dir).map_err(|e| ConfigError::Write {
        path: data_dir.to_path_buf(),
        source: e,
    })?;
    atomic_write(&path, updated.as_bytes()).map_err(|e| ConfigError::Write { path, source: e })?;
    Ok(config)
}

/// Keys `config set` accepts. Colour slots are free-form under `ui.colors`.
const KNOWN_KEYS: &[&str] = &[
    "watch.suppression_window_ms",
    "editor.command",
    "ui.capture_section",
    "ui.done_section",
];

fn is_known_key(key: &str) -> bool {
    if KNOWN_KEYS.contains(&key) {
        return true;
    }
    key.strip_prefix("ui.colors.")
        .is_some_and(|slot| !slot.trim().is_empty() && !slot.contains('.'))
}

/// Integers and booleans keep their type, with the raw string as a
/// fallback; everything else is a string.
fn candidate_values(raw: &str) -> Vec<toml_edit::Value> {
    let typed: Option<toml_edit::Value> = if let Ok(n) = raw.parse::<i64>() {
        Some(n.into())
    } else {
        match raw {
            "true" => Some(true.into()),
            "false" => Some(false.into()),
            _ => None,
        }
    };
    let mut values: Vec<toml_edit::Value> = typed.into_iter().collect();
    values.push(raw.into());
    values
}

fn set_dotted(
    doc: &mut toml_edit::DocumentMut,
    key: &str,
    value: toml_edit::Value,
) -> Result<(), ConfigError> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.len() < 2 || parts.iter().any(|p| p.trim().is_empty()) {
        return Err(ConfigError::UnknownKey(key.to_string()));
    }
    let (last, tables) = parts.split_last().ok_or(ConfigError::UnknownKey(key.to_string()))?;

    let mut table: &mut dyn toml_edit::TableLike = doc.as_table_mut();
    for part in tables {
        if !table.contains_key(part) {
            table.insert(part, toml_edit::Item::Table(toml_edit::Table::new()));
        }
        table = table
            .get_mut(part)
            .and_then(|item| item.as_table_like_mut())
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
    }
    table.insert(last, toml_edit::value(value));
    Ok(())
}
