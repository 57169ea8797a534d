use super::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
struct StoredFile {
    bytes: Vec<u8>,
    created_at: u64,
}

/// Process-local backend. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    files: Arc<RwLock<HashMap<String, StoredFile>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn write(&self, name: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let mut files = self.files.write().await;
        let created_at = files
            .get(name)
            .map(|f| f.created_at)
            .unwrap_or_else(|| millis_since_epoch(SystemTime::now()));
        files.insert(name.to_string(), StoredFile { bytes, created_at });
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.files
            .read()
            .await
            .get(name)
            .map(|f| f.bytes.clone())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn rename(&self, old_name: &str, new_name: &str) -> Result<(), StorageError> {
        let mut files = self.files.write().await;
        let file = files
            .remove(old_name)
            .ok_or_else(|| StorageError::NotFound(old_name.to_string()))?;
        files.insert(new_name.to_string(), file);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.files
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn stat(&self, name: &str) -> Result<FileStat, StorageError> {
        self.files
            .read()
            .await
            .get(name)
            .map(|f| FileStat {
                created_at: f.created_at,
            })
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn list_names(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.files.read().await.keys().cloned().collect())
    }
}
