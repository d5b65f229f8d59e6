use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use tracing::debug;

use crate::io::recovery::{self, RecoveryEntry};

/// Name of the hidden directory under `$HOME` that holds the task file.
pub const DATA_DIR_NAME: &str = ".today";

/// File name of the task document inside the data directory.
pub const DOCUMENT_FILE: &str = "today.md";

/// Content written on first run.
pub const DEFAULT_TEMPLATE: &str = "\
# Monthly Goals

# This Week

# Today

# Done
";

/// Error type for task file I/O
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not create task file at {path}: {source}")]
    Startup {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not locate home directory (set HOME or TODAY_DIR)")]
    NoHome,
}

/// Timestamp of the most recent write issued by a [`Store`].
///
/// Clones share the same record, so a notifier holding a clone of the store
/// sees every write made through any other clone.
#[derive(Debug, Clone, Default)]
pub struct WriteRecord(Arc<Mutex<Option<Instant>>>);

impl WriteRecord {
    pub fn mark(&self) {
        self.mark_at(Instant::now());
    }

    pub fn mark_at(&self, at: Instant) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = Some(at);
    }

    pub fn last(&self) -> Option<Instant> {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Owner of the task document on disk.
///
/// The store is the only component that writes the document. Every
/// operation first makes sure the file exists, so a deleted file or
/// directory is recreated from [`DEFAULT_TEMPLATE`] instead of failing.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
    path: PathBuf,
    last_write: WriteRecord,
}

impl Store {
    /// A store whose document lives at `dir/today.md`. Nothing is touched
    /// on disk until the first operation.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let path = dir.join(DOCUMENT_FILE);
        Store {
            dir,
            path,
            last_write: WriteRecord::default(),
        }
    }

    /// A store in `~/.today/`.
    pub fn at_home() -> Result<Self, StoreError> {
        Ok(Self::new(default_data_dir()?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shared handle to the write timestamp.
    pub fn write_record(&self) -> &WriteRecord {
        &self.last_write
    }

    pub fn last_write(&self) -> Option<Instant> {
        self.last_write.last()
    }

    /// Create the directory and the default document if either is missing.
    /// An existing document is never touched.
    pub fn ensure_exists(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::Startup {
            path: self.dir.clone(),
            source: e,
        })?;

        if self.path.exists() {
            return Ok(());
        }

        // create_new so a file that appears between the check and the open
        // is left alone
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path);
        let mut file = match file {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(()),
            Err(e) => {
                return Err(StoreError::Startup {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };
        file.write_all(DEFAULT_TEMPLATE.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| StoreError::Startup {
                path: self.path.clone(),
                source: e,
            })?;
        debug!(path = %self.path.display(), "created task file from template");
        Ok(())
    }

    /// Current content of the document, straight from disk.
    pub fn read(&self) -> Result<String, StoreError> {
        self.ensure_exists()?;
        fs::read_to_string(&self.path).map_err(|e| StoreError::Read {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Replace the document with `content`.
    ///
    /// The write time is recorded before the file is touched, so every
    /// watcher event the write raises is stamped at or after it. That
    /// includes recreating a deleted file from the template. If the write
    /// fails the content goes to the recovery log before the error is
    /// returned.
    pub fn write(&self, content: &str) -> Result<(), StoreError> {
        self.last_write.mark();
        self.ensure_exists()?;
        if let Err(e) = recovery::atomic_write(&self.path, content.as_bytes()) {
            recovery::log_recovery(
                &self.dir,
                RecoveryEntry {
                    timestamp: Utc::now(),
                    description: "task file write failed".to_string(),
                    fields: vec![
                        ("Target".to_string(), self.path.display().to_string()),
                        ("Error".to_string(), e.to_string()),
                    ],
                    body: content.to_string(),
                },
            );
            return Err(StoreError::Write {
                path: self.path.clone(),
                source: e,
            });
        }
        debug!(bytes = content.len(), "wrote task file");
        Ok(())
    }
}

/// `$TODAY_DIR` if set, otherwise `$HOME/.today`.
pub fn default_data_dir() -> Result<PathBuf, StoreError> {
    if let Some(dir) = std::env::var_os("TODAY_DIR").filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(|home| PathBuf::from(home).join(DATA_DIR_NAME))
        .ok_or(StoreError::NoHome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store_in(tmp: &TempDir) -> Store {
        Store::new(tmp.path().join("nested").join(DATA_DIR_NAME))
    }

    #[test]
    fn first_read_creates_default_template() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        assert!(!store.dir().exists());

        let content = store.read().unwrap();
        assert_eq!(content, DEFAULT_TEMPLATE);
        assert!(store.path().is_file());

        let headers: Vec<&str> = content.lines().filter(|l| l.starts_with('#')).collect();
        assert_eq!(
            headers,
            vec!["# Monthly Goals", "# This Week", "# Today", "# Done"]
        );
        assert!(!content.lines().any(|l| l.starts_with("- ")));
    }

    #[test]
    fn default_template_text() {
        insta::assert_snapshot!(DEFAULT_TEMPLATE, @r"
        # Monthly Goals

        # This Week

        # Today

        # Done
        ");
    }

    #[test]
    fn ensure_exists_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        for _ in 0..5 {
            store.ensure_exists().unwrap();
        }
        assert_eq!(fs::read_to_string(store.path()).unwrap(), DEFAULT_TEMPLATE);
    }

    #[test]
    fn ensure_exists_keeps_existing_content() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.path(), "# Today\n- already here\n").unwrap();

        store.ensure_exists().unwrap();
        store.ensure_exists().unwrap();
        assert_eq!(store.read().unwrap(), "# Today\n- already here\n");
    }

    #[test]
    fn read_after_write_is_exact() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        for content in [
            "",
            "# Today\n- buy milk\n",
            "no trailing newline",
            "# Heute\n- Müll rausbringen ☕\n- 日本語のタスク 🎌\r\n",
        ] {
            store.write(content).unwrap();
            assert_eq!(store.read().unwrap(), content);
        }
    }

    #[test]
    fn write_records_timestamp() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        assert!(store.last_write().is_none());

        let before = Instant::now();
        store.write("x").unwrap();
        let recorded = store.last_write().unwrap();
        assert!(recorded >= before);
        assert!(recorded <= Instant::now());
    }

    #[test]
    fn clones_share_write_record() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let other = store.clone();
        store.write("shared").unwrap();
        assert_eq!(other.last_write(), store.last_write());
    }

    #[test]
    fn deleted_file_is_recreated() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        store.write("# Today\n- a\n").unwrap();
        fs::remove_dir_all(store.dir()).unwrap();
        assert_eq!(store.read().unwrap(), DEFAULT_TEMPLATE);
    }

    #[cfg(unix)]
    #[test]
    fn startup_error_when_dir_cannot_be_created() {
        let tmp = TempDir::new().unwrap();
        // a regular file where the parent directory should be
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let store = Store::new(blocker.join(DATA_DIR_NAME));
        let err = store.read().unwrap_err();
        assert!(matches!(err, StoreError::Startup { .. }), "{err}");
    }

    #[test]
    fn failed_write_goes_to_recovery_log() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        // a non-empty directory where the task file should be; renaming
        // over it fails even for root
        fs::create_dir_all(store.path().join("occupied")).unwrap();

        let unsaved = "# Today\n- do not lose me\n";
        let err = store.write(unsaved).unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }), "{err}");

        let entries = crate::io::recovery::read_recovery_entries(store.dir());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].body, unsaved);
        assert!(
            entries[0]
                .fields
                .iter()
                .any(|(k, v)| k == "Target" && v.ends_with("today.md"))
        );
    }
}
