//! Key-value storage backends the ledger store writes its slots into

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    QuotaExceeded,
    InvalidKey,
    Io,
    Unavailable,
}

impl StorageErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QuotaExceeded => "quota_exceeded",
            Self::InvalidKey => "invalid_key",
            Self::Io => "io_error",
            Self::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for StorageError {}

/// Synchronous string-keyed storage with a size limit and possible eviction
pub trait KeyValueStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// In-process storage with an optional byte quota
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
    quota_bytes: Option<usize>,
    rejected_keys: HashSet<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse writes that would push the total stored bytes past `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::default()
        }
    }

    /// Make every write to `key` fail, as a broken or evicted entry would
    pub fn reject_writes_to(&mut self, key: &str) {
        self.rejected_keys.insert(key.to_string());
    }

    pub fn used_bytes(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.rejected_keys.contains(key) {
            return Err(StorageError::new(
                StorageErrorKind::Unavailable,
                format!("writes to {key} are rejected"),
            ));
        }
        if let Some(quota) = self.quota_bytes {
            let replaced = self.entries.get(key).map_or(0, |old| key.len() + old.len());
            let projected = self.used_bytes() - replaced + key.len() + value.len();
            if projected > quota {
                return Err(StorageError::new(
                    StorageErrorKind::QuotaExceeded,
                    format!("writing {key} needs {projected} bytes, quota is {quota}"),
                ));
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One file per key under a data directory.
///
/// Writes go to `<key>.tmp` first and are renamed into place, so a crash
/// mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| io_error(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::new(
                StorageErrorKind::InvalidKey,
                format!("storage key {key:?} must be ascii alphanumeric, '_' or '-'"),
            ));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

fn io_error(path: &Path, err: std::io::Error) -> StorageError {
    StorageError::new(StorageErrorKind::Io, format!("{}: {err}", path.display()))
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| io_error(&path, e))
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}
