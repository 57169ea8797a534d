//! Mutating operations on the image store.
//!
//! Each operation runs its backend step and then the matching index step while
//! holding `writer`, so two mutations never interleave. Listing and reading do
//! not take the writer lock and may observe the backend ahead of the index
//! while a mutation is in flight.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::errors::{ApiError, StorageError};
use crate::index::{ImageIndex, ImageRecord};
use crate::storage::{Storage, generate_name};

const NAME_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

pub struct ImageLibrary {
    storage: Arc<dyn Storage>,
    index: ImageIndex,
    writer: Mutex<()>,
}

impl ImageLibrary {
    pub fn new(storage: Arc<dyn Storage>, base_url: impl Into<String>) -> Self {
        let index = ImageIndex::new(storage.clone(), base_url);
        Self {
            storage,
            index,
            writer: Mutex::new(()),
        }
    }

    pub fn index(&self) -> &ImageIndex {
        &self.index
    }

    pub async fn initialize(&self) -> Result<(), StorageError> {
        let _guard = self.writer.lock().await;
        self.index.initialize().await
    }

    /// Store `bytes` under a freshly generated name and index it.
    pub async fn upload(
        &self,
        original_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, ApiError> {
        let _guard = self.writer.lock().await;

        let name = self.unused_name(original_name).await?;
        self.storage.write(&name, bytes).await?;
        self.index.create_entry(&name).await?;

        tracing::info!(original_name, name = %name, "Upload complete");
        Ok(UploadResponse {
            original_name: Some(original_name.to_string()),
            url: Some(self.index.url_for(&name)),
            name: Some(name),
        })
    }

    pub async fn rename(&self, old_name: &str, new_name: &str) -> Result<(), ApiError> {
        let _guard = self.writer.lock().await;

        self.storage.rename(old_name, new_name).await?;
        tracing::debug!(old_name, new_name, "Rename complete!");
        self.index.rename_entry(old_name, new_name).await?;
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<(), ApiError> {
        let _guard = self.writer.lock().await;

        self.storage.delete(name).await?;
        tracing::debug!(name, "Delete complete!");
        self.index.delete_entry(name).await;
        Ok(())
    }

    pub async fn list(&self) -> BTreeMap<String, ImageRecord> {
        self.index.list().await
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.storage.read(name).await
    }

    async fn unused_name(&self, original_name: &str) -> Result<String, StorageError> {
        for _ in 0..NAME_ATTEMPTS {
            let name = generate_name(original_name);
            match self.storage.stat(&name).await {
                Err(StorageError::NotFound(_)) => return Ok(name),
                Ok(_) => tracing::warn!(name = %name, "Generated name already taken, retrying"),
                Err(e) => return Err(e),
            }
        }
        Err(StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "could not find a free file name",
        )))
    }
}

/// Reject names whose first character is not a word character.
///
/// Only the first character is checked, matching what clients of this API
/// already rely on. Path separators are refused by the storage backend.
pub fn is_valid_name(name: &str) -> bool {
    name.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
}
