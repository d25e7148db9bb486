//! JSON records for note metadata, the index and the alias map.
//!
//! Writes truncate the target, write the whole record and sync. There is no
//! temp-file-and-rename step, so a crash mid-write can leave a truncated record;
//! readers treat that as [`StoreError::CorruptRecord`].

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};

/// Serializes a record. Compact JSON with a trailing newline.
pub fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec(record)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decodes a record read from `path`. Empty or malformed input is `CorruptRecord`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8], path: &Path) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(|source| StoreError::CorruptRecord {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads and decodes the record at `path`.
pub fn read_record<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let bytes = std::fs::read(path).map_err(|e| StoreError::io(path, e))?;
    decode(&bytes, path)
}

/// Encodes `record` and rewrites `path` in full.
pub fn write_record<T: Serialize>(path: &Path, record: &T) -> StoreResult<()> {
    let bytes = encode(record).map_err(|source| StoreError::CorruptRecord {
        path: path.to_path_buf(),
        source,
    })?;
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| StoreError::io(path, e))?;
    file.write_all(&bytes).map_err(|e| StoreError::io(path, e))?;
    file.sync_all().map_err(|e| StoreError::io(path, e))
}
