//! Filesystem adapters for Spindle.
//!
//! `FileStore` implements the `WorkflowStore` trait from `spindle-core`,
//! one record per file: `{dir}/{key}.json` or `{dir}/{key}.yaml`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use spindle_core::repository::{WorkflowStore, validate_key};
use spindle_core::serializer::WorkflowRecord;
use spindle_core::serializer::format::{from_text, to_text};
use spindle_types::config::DurableFormat;
use spindle_types::error::RepositoryError;

/// Directory-backed workflow store.
///
/// Writes in its configured format. Reads whichever of `.json`, `.yaml`
/// or `.yml` exists for a key, preferring the configured format.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    format: DurableFormat,
    pretty: bool,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>, format: DurableFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
            pretty: true,
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a record is written to: `{dir}/{key}.{ext}`.
    pub fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{}", self.format.extension()))
    }

    /// Existing file for `key`, trying the configured format first.
    fn existing_path(&self, key: &str) -> Option<PathBuf> {
        let preferred = self.record_path(key);
        if preferred.is_file() {
            return Some(preferred);
        }
        ["json", "yaml", "yml"]
            .iter()
            .map(|ext| self.dir.join(format!("{key}.{ext}")))
            .find(|path| path.is_file())
    }
}

fn io_error(path: &Path, err: std::io::Error) -> RepositoryError {
    RepositoryError::Io(format!("{}: {err}", path.display()))
}

impl WorkflowStore for FileStore {
    fn save(&self, key: &str, record: &WorkflowRecord) -> Result<(), RepositoryError> {
        validate_key(key)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;

        let text = to_text(record, self.format, self.pretty)
            .map_err(|e| RepositoryError::Format(e.to_string()))?;
        let path = self.record_path(key);
        // Write beside the target, then rename over it.
        let staging = self.dir.join(format!(".{key}.tmp"));
        std::fs::write(&staging, text).map_err(|e| io_error(&staging, e))?;
        std::fs::rename(&staging, &path).map_err(|e| io_error(&path, e))?;

        tracing::debug!(key, path = %path.display(), "wrote workflow record");
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<WorkflowRecord>, RepositoryError> {
        validate_key(key)?;
        let Some(path) = self.existing_path(key) else {
            return Ok(None);
        };
        let text = std::fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
        let format = DurableFormat::from_path(&path).unwrap_or(self.format);
        let record = from_text(&text, format)
            .map_err(|e| RepositoryError::Format(format!("{}: {e}", path.display())))?;
        Ok(Some(record))
    }

    fn list(&self) -> Result<Vec<String>, RepositoryError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_error(&self.dir, err)),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_error(&self.dir, e))?.path();
            if DurableFormat::from_path(&path).is_none() {
                continue;
            }
            if let Some(key) = path.file_stem().and_then(|s| s.to_str())
                && validate_key(key).is_ok()
            {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    fn delete(&self, key: &str) -> Result<bool, RepositoryError> {
        validate_key(key)?;
        let mut removed = false;
        for ext in ["json", "yaml", "yml"] {
            let path = self.dir.join(format!("{key}.{ext}"));
            match std::fs::remove_file(&path) {
                Ok(()) => removed = true,
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(io_error(&path, err)),
            }
        }
        Ok(removed)
    }
}
