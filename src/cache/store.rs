use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use super::key::CacheKey;
use super::CacheError;

/// Byte-level key-value storage behind [`super::ResultCache`].
///
/// Implementations must make `write` atomic with respect to `read`: a
/// concurrent reader sees either nothing or the complete value.
pub trait EntryStore: Send + Sync {
    fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError>;

    fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError>;

    /// Remove an entry. Removing a missing entry is not an error.
    fn remove(&self, key: &CacheKey) -> Result<(), CacheError>;

    fn exists(&self, key: &CacheKey) -> bool;
}

/// One JSON file per key under a directory.
///
/// With fan-out enabled, entries are spread over sub-directories named after
/// the first two characters of the key (`ab/abcdef….json`).
pub struct FsEntryStore {
    dir: PathBuf,
    fan_out: bool,
}

impl FsEntryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            fan_out: false,
        }
    }

    pub fn with_fan_out(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            fan_out: true,
        }
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        let file = format!("{}.json", key.as_str());
        let key = key.as_str();
        if self.fan_out && key.len() > 2 {
            self.dir.join(&key[..2]).join(file)
        } else {
            self.dir.join(file)
        }
    }
}

impl EntryStore for FsEntryStore {
    fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError> {
        let path = self.path_for(key);
        let parent = path.parent().unwrap_or(&self.dir);
        std::fs::create_dir_all(parent)?;

        // Temp file in the target directory so the rename never crosses filesystems.
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| CacheError::Io(e.error))?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Cache entry written");
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> Result<(), CacheError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    fn exists(&self, key: &CacheKey) -> bool {
        self.path_for(key).is_file()
    }
}
