use super::*;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct LocalFileStorage {
    storage_path: PathBuf,
}

impl LocalFileStorage {
    pub fn new(storage_path: PathBuf) -> Result<Self, StorageError> {
        if !storage_path.exists() {
            std::fs::create_dir_all(&storage_path)?;
            tracing::info!("Created image directory {}", storage_path.display());
        }
        Ok(Self { storage_path })
    }

    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    // Names are single path components, nothing that can walk out of the directory.
    fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0'])
        {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.storage_path.join(name))
    }
}

#[async_trait]
impl Storage for LocalFileStorage {
    async fn write(&self, name: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let path = self.resolve(name)?;
        fs::write(&path, bytes)
            .await
            .map_err(|e| StorageError::from_io(name, e))
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(name)?;
        fs::read(&path)
            .await
            .map_err(|e| StorageError::from_io(name, e))
    }

    async fn rename(&self, old_name: &str, new_name: &str) -> Result<(), StorageError> {
        let old_path = self.resolve(old_name)?;
        let new_path = self.resolve(new_name)?;
        fs::rename(&old_path, &new_path)
            .await
            .map_err(|e| StorageError::from_io(old_name, e))
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.resolve(name)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| StorageError::from_io(name, e))
    }

    async fn stat(&self, name: &str) -> Result<FileStat, StorageError> {
        let path = self.resolve(name)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| StorageError::from_io(name, e))?;

        // Not every filesystem records birth time.
        let created = meta
            .created()
            .or_else(|_| meta.modified())
            .map_err(|e| StorageError::Unreadable(name.to_string(), e))?;

        Ok(FileStat {
            created_at: millis_since_epoch(created),
        })
    }

    async fn list_names(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = fs::read_dir(&self.storage_path).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => tracing::warn!("Skipping non UTF-8 file name {:?}", raw),
            }
        }

        Ok(names)
    }
}
