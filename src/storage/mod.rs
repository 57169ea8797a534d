mod in_memory;
mod local_fs;

pub use in_memory::InMemoryStorage;
pub use local_fs::LocalFileStorage;

use crate::errors::StorageError;
use async_trait::async_trait;
use rand::{Rng, distributions::Alphanumeric};
use std::time::{SystemTime, UNIX_EPOCH};

const ID_LEN: usize = 6;

/// Metadata read back from the backend for a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Birth time in milliseconds since the Unix epoch.
    pub created_at: u64,
}

#[async_trait]
pub trait Storage: Send + Sync + 'static {
    async fn write(&self, name: &str, bytes: Vec<u8>) -> Result<(), StorageError>;
    async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError>;
    async fn rename(&self, old_name: &str, new_name: &str) -> Result<(), StorageError>;
    async fn delete(&self, name: &str) -> Result<(), StorageError>;
    async fn stat(&self, name: &str) -> Result<FileStat, StorageError>;
    async fn list_names(&self) -> Result<Vec<String>, StorageError>;
}

/// Build a fresh file name: a random six character id plus the extension of
/// `original`.
///
/// The extension is whatever sits between the first and second `.`, so
/// `a.b.png` yields `b`.
pub fn generate_name(original: &str) -> String {
    let id: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect();

    match original.split('.').nth(1) {
        Some(ext) => format!("{id}.{ext}"),
        None => id,
    }
}

pub(crate) fn millis_since_epoch(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
