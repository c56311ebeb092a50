use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::ChatStoreError;

/// Injected durable-storage boundary: one named slot holding one opaque
/// string blob. Keeps the store and codec testable without a real medium.
pub trait StorageSlot {
    fn read(&self) -> Result<Option<String>, ChatStoreError>;
    fn write(&self, blob: &str) -> Result<(), ChatStoreError>;
}

/// File-backed slot. Writes land in a sibling temp file first and are
/// renamed into place, so a crash mid-write never truncates the blob.
#[derive(Debug)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "history".to_string());
        self.path
            .with_file_name(format!(".{file_name}.tmp.{}", std::process::id()))
    }
}

impl StorageSlot for FileSlot {
    fn read(&self) -> Result<Option<String>, ChatStoreError> {
        match fs::read_to_string(&self.path) {
            Ok(blob) => Ok(Some(blob)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(ChatStoreError::io("reading state file", &self.path, error)),
        }
    }

    fn write(&self, blob: &str) -> Result<(), ChatStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|error| ChatStoreError::io("creating state directory", parent, error))?;
        }

        let temp_path = self.temp_path();
        fs::write(&temp_path, blob)
            .map_err(|error| ChatStoreError::io("writing state temp file", &temp_path, error))?;
        fs::rename(&temp_path, &self.path)
            .map_err(|error| ChatStoreError::io("replacing state file", &self.path, error))
    }
}

/// In-memory slot for tests.
#[derive(Debug, Default)]
pub struct MemorySlot {
    blob: Mutex<Option<String>>,
}

impl MemorySlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current blob contents, for assertions.
    #[must_use]
    pub fn snapshot(&self) -> Option<String> {
        lock_unpoisoned(&self.blob).clone()
    }
}

impl StorageSlot for MemorySlot {
    fn read(&self) -> Result<Option<String>, ChatStoreError> {
        Ok(lock_unpoisoned(&self.blob).clone())
    }

    fn write(&self, blob: &str) -> Result<(), ChatStoreError> {
        *lock_unpoisoned(&self.blob) = Some(blob.to_string());
        Ok(())
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
