//! Plain-file storage backend.

use std::path::PathBuf;

use anyhow::{Context, Result};

use super::KeyValueStorage;

/// One file per key under a sandbox directory.
///
/// Writes go to a sidecar file renamed into place, so readers and crashed
/// writers never observe a half-written value.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create storage directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Keys are dotted identifiers; anything path-like is flattened so a
    /// key can never escape the sandbox directory.
    fn entry_path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(name)
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read storage entry {}", key))?;
        Ok(Some(bytes))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.entry_path(key);
        let mut sidecar = path.clone().into_os_string();
        sidecar.push(".tmp");
        let sidecar = PathBuf::from(sidecar);

        std::fs::write(&sidecar, value)
            .with_context(|| format!("Failed to write storage entry {}", key))?;
        std::fs::rename(&sidecar, &path)
            .with_context(|| format!("Failed to commit storage entry {}", key))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to delete storage entry {}", key))?;
        }
        Ok(())
    }
}
