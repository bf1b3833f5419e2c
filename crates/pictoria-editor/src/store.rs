//! Persistence of encoded renders.
//!
//! A store holds a flat, append-only list of encoded images under one
//! logical key. Every append rewrites the whole list: the list is loaded,
//! extended and written back, which is not atomic. Callers must serialize
//! appends (see [`crate::worker::SaveWorker`]).

use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ciborium::Value;
use thiserror::Error;

use crate::config::EditorConfig;

/// Errors from reading or writing a store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stored document could not be decoded.
    #[error("Corrupt store document: {0}")]
    Corrupt(String),

    /// The document on disk belongs to another key.
    #[error("Store key mismatch: expected {expected:?}, found {found:?}")]
    KeyMismatch { expected: String, found: String },

    /// The document could not be serialized.
    #[error("Failed to write store document: {0}")]
    Serialize(String),

    /// A previous writer panicked mid-update.
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Append-only list of encoded images.
pub trait PersistentStore: Send + Sync {
    /// Append one encoded image, rewriting the whole list.
    fn append_encoded(&self, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// All entries, in insertion order.
    fn load_all_encoded(&self) -> Result<Vec<Vec<u8>>, StoreError>;
}

/// In-process store, mainly for tests and previews.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_all(&self, list: Vec<Vec<u8>>) -> Result<(), StoreError> {
        *self.entries.lock().map_err(|_| StoreError::Poisoned)? = list;
        Ok(())
    }
}

impl PersistentStore for MemoryStore {
    fn append_encoded(&self, bytes: Vec<u8>) -> Result<(), StoreError> {
        // Load, extend, write back as separate steps, like the file store
        let mut list = self.load_all_encoded()?;
        list.push(bytes);
        self.write_all(list)
    }

    fn load_all_encoded(&self) -> Result<Vec<Vec<u8>>, StoreError> {
        Ok(self.entries.lock().map_err(|_| StoreError::Poisoned)?.clone())
    }
}

/// Store backed by a single CBOR file.
///
/// The document is a map `{ "key": text, "entries": [bytes, ...] }`. Writes go
/// to a sibling temp file which is then renamed over the original.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    key: String,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    /// Store at `path` under the configured logical key.
    pub fn from_config(path: impl Into<PathBuf>, config: &EditorConfig) -> Self {
        Self::new(path, config.store_key.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_all(&self, entries: Vec<Vec<u8>>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let document = Value::Map(vec![
            (Value::Text("key".into()), Value::Text(self.key.clone())),
            (
                Value::Text("entries".into()),
                Value::Array(entries.into_iter().map(Value::Bytes).collect()),
            ),
        ]);

        let temp = self.temp_path();
        {
            let file = fs::File::create(&temp)?;
            let mut writer = BufWriter::new(file);
            ciborium::into_writer(&document, &mut writer)
                .map_err(|e| StoreError::Serialize(e.to_string()))?;
            io::Write::flush(&mut writer)?;
        }
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn decode_document(&self, document: Value) -> Result<Vec<Vec<u8>>, StoreError> {
        let Value::Map(fields) = document else {
            return Err(StoreError::Corrupt("document is not a map".into()));
        };

        let mut key = None;
        let mut entries = None;
        for (name, value) in fields {
            match (name.as_text(), value) {
                (Some("key"), Value::Text(text)) => key = Some(text),
                (Some("entries"), Value::Array(items)) => entries = Some(items),
                _ => {}
            }
        }

        let found = key.ok_or_else(|| StoreError::Corrupt("missing key".into()))?;
        if found != self.key {
            return Err(StoreError::KeyMismatch {
                expected: self.key.clone(),
                found,
            });
        }

        entries
            .ok_or_else(|| StoreError::Corrupt("missing entries".into()))?
            .into_iter()
            .map(|item| match item {
                Value::Bytes(bytes) => Ok(bytes),
                _ => Err(StoreError::Corrupt("entry is not a byte string".into())),
            })
            .collect()
    }
}

impl PersistentStore for FileStore {
    fn append_encoded(&self, bytes: Vec<u8>) -> Result<(), StoreError> {
        let mut list = self.load_all_encoded()?;
        list.push(bytes);
        let count = list.len();
        self.write_all(list)?;
        tracing::debug!(path = %self.path.display(), entries = count, "store rewritten");
        Ok(())
    }

    fn load_all_encoded(&self) -> Result<Vec<Vec<u8>>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(fs::File::open(&self.path)?);
        let document: Value =
            ciborium::from_reader(reader).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.decode_document(document)
    }
}
