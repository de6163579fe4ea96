//! Atomic JSON file operations.
//!
//! Manifests are rewritten whole on every change. Readers must never see a
//! partially written file, so every save goes through a temporary file and
//! an atomic rename, and read-modify-write cycles hold an exclusive lock.

use ageline_core::AgelineError;
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

/// Errors that can occur during atomic JSON operations.
#[derive(Debug)]
pub enum AtomicJsonError {
    /// File I/O error.
    IoError(std::io::Error),
    /// JSON parse or serialization error.
    JsonError(serde_json::Error),
    /// File locking error.
    LockError(String),
    /// The update callback rejected the change.
    Rejected(AgelineError),
}

impl std::fmt::Display for AtomicJsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtomicJsonError::IoError(e) => write!(f, "I/O error: {}", e),
            AtomicJsonError::JsonError(e) => write!(f, "JSON error: {}", e),
            AtomicJsonError::LockError(e) => write!(f, "Lock error: {}", e),
            AtomicJsonError::Rejected(e) => write!(f, "Update rejected: {}", e),
        }
    }
}

impl std::error::Error for AtomicJsonError {}

impl From<std::io::Error> for AtomicJsonError {
    fn from(e: std::io::Error) -> Self {
        AtomicJsonError::IoError(e)
    }
}

impl From<serde_json::Error> for AtomicJsonError {
    fn from(e: serde_json::Error) -> Self {
        AtomicJsonError::JsonError(e)
    }
}

impl From<AgelineError> for AtomicJsonError {
    fn from(e: AgelineError) -> Self {
        AtomicJsonError::Rejected(e)
    }
}

impl From<AtomicJsonError> for AgelineError {
    fn from(e: AtomicJsonError) -> Self {
        match e {
            AtomicJsonError::Rejected(inner) => inner,
            AtomicJsonError::IoError(io) => AgelineError::from(io),
            AtomicJsonError::JsonError(json) => AgelineError::from(json),
            AtomicJsonError::LockError(message) => AgelineError::io(message),
        }
    }
}

/// A handle to a JSON document stored with atomic replace semantics.
pub struct AtomicJsonFile {
    path: PathBuf,
}

impl AtomicJsonFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the document.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))`: Successfully loaded and parsed
    /// - `Ok(None)`: File doesn't exist or is empty
    /// - `Err`: Failed to read or parse the file
    pub fn load(&self) -> Result<Option<serde_json::Value>, AtomicJsonError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Replaces the document atomically (tmp file, fsync, rename).
    pub fn save(&self, value: &serde_json::Value) -> Result<(), AtomicJsonError> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let json_string = serde_json::to_string_pretty(value)?;

        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(json_string.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    /// Load-modify-save under an exclusive file lock.
    ///
    /// `f` receives the current document (`None` when missing) and returns
    /// the replacement. Nothing is written if `f` fails.
    pub fn update<F>(&self, f: F) -> Result<serde_json::Value, AtomicJsonError>
    where
        F: FnOnce(Option<serde_json::Value>) -> Result<serde_json::Value, AtomicJsonError>,
    {
        let _lock = FileLock::acquire(&self.path)?;

        let current = self.load()?;
        let updated = f(current)?;
        self.save(&updated)?;

        Ok(updated)
    }

    fn temp_path(&self) -> Result<PathBuf, AtomicJsonError> {
        let parent = self.path.parent().ok_or_else(|| {
            AtomicJsonError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no parent directory",
            ))
        })?;
        let file_name = self.path.file_name().ok_or_else(|| {
            AtomicJsonError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no file name",
            ))
        })?;

        Ok(parent.join(format!(".{}.tmp", file_name.to_string_lossy())))
    }
}

/// Exclusive lock held for the duration of an update.
struct FileLock {
    #[allow(dead_code)]
    file: File,
    lock_path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self, AtomicJsonError> {
        let lock_path = path.with_extension("lock");

        if let Some(parent) = lock_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()
                .map_err(|e| AtomicJsonError::LockError(format!("Failed to acquire lock: {}", e)))?;
        }

        Ok(FileLock { file, lock_path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicJsonFile::new(temp_dir.path().join("nested").join("doc.json"));

        file.save(&json!({"count": 1})).unwrap();

        let loaded = file.load().unwrap().unwrap();
        assert_eq!(loaded["count"], 1);
        assert!(!temp_dir.path().join("nested").join(".doc.json.tmp").exists());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicJsonFile::new(temp_dir.path().join("missing.json"));
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn test_update_applies_change() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicJsonFile::new(temp_dir.path().join("doc.json"));
        file.save(&json!({"count": 1})).unwrap();

        file.update(|current| {
            let mut value = current.unwrap_or_else(|| json!({"count": 0}));
            value["count"] = json!(value["count"].as_i64().unwrap_or(0) + 10);
            Ok(value)
        })
        .unwrap();

        assert_eq!(file.load().unwrap().unwrap()["count"], 11);
        assert!(!temp_dir.path().join("doc.lock").exists());
    }

    #[test]
    fn test_rejected_update_leaves_file_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicJsonFile::new(temp_dir.path().join("doc.json"));
        file.save(&json!({"count": 1})).unwrap();

        let result = file.update(|_| Err(AgelineError::conflict("busy").into()));

        let err: AgelineError = result.unwrap_err().into();
        assert!(err.is_conflict());
        assert_eq!(file.load().unwrap().unwrap()["count"], 1);
    }
}
