//! In-memory index of the stored images.
//!
//! The index caches per-file metadata (URL and birth time) so listing does not
//! have to stat every file on disk. The storage backend stays the source of
//! truth: the index is filled from it once at startup and afterwards every
//! mutation of the backend is followed by the matching index operation.
//!
//! All access goes through a single [`RwLock`]. Each operation is one
//! in-memory transition, so a reader never sees half of a rename. Backend I/O
//! (`stat`) always happens before the lock is taken.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::errors::StorageError;
use crate::storage::Storage;

/// One stored image as reported by the list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub url: String,
    pub name: String,
    pub created_at: u64,
}

pub struct ImageIndex {
    storage: Arc<dyn Storage>,
    base_url: String,
    entries: RwLock<BTreeMap<String, ImageRecord>>,
}

impl ImageIndex {
    pub fn new(storage: Arc<dyn Storage>, base_url: impl Into<String>) -> Self {
        Self {
            storage,
            base_url: base_url.into(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Rebuild the index from whatever the backend currently holds.
    ///
    /// The new map is built off to the side and swapped in, so running this
    /// again simply replaces the old contents.
    pub async fn initialize(&self) -> Result<(), StorageError> {
        let names = self.storage.list_names().await?;
        let mut fresh = BTreeMap::new();

        for name in names {
            let record = self.read_record(&name).await?;
            fresh.insert(name, record);
        }

        let count = fresh.len();
        *self.entries.write().await = fresh;
        tracing::debug!(count, "Image index initialized");
        Ok(())
    }

    /// Stat `name` on the backend and insert (or overwrite) its record.
    pub async fn create_entry(&self, name: &str) -> Result<(), StorageError> {
        let record = self.read_record(name).await?;
        self.entries.write().await.insert(name.to_string(), record);
        tracing::debug!(name, "Indexed image");
        Ok(())
    }

    /// Drop `name` from the index. Absent names are ignored.
    pub async fn delete_entry(&self, name: &str) {
        if self.entries.write().await.remove(name).is_some() {
            tracing::debug!(name, "Removed image from index");
        }
    }

    /// Move the record for `old_name` to `new_name`.
    ///
    /// Call this after the backend rename succeeded. `new_name` is stat'ed
    /// first, then the removal and insertion are applied under one write. If
    /// the stat fails, `old_name` is still dropped, since the backend no
    /// longer has it, and the error is returned.
    pub async fn rename_entry(&self, old_name: &str, new_name: &str) -> Result<(), StorageError> {
        let record = self.read_record(new_name).await;

        let mut entries = self.entries.write().await;
        entries.remove(old_name);
        let record = record?;
        entries.insert(new_name.to_string(), record);

        tracing::debug!(old_name, new_name, "Renamed image in index");
        Ok(())
    }

    /// Snapshot of every record, ordered by name.
    pub async fn list(&self) -> BTreeMap<String, ImageRecord> {
        self.entries.read().await.clone()
    }

    #[cfg(test)]
    pub async fn get(&self, name: &str) -> Option<ImageRecord> {
        self.entries.read().await.get(name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub fn url_for(&self, name: &str) -> String {
        format!("{}{}", self.base_url, name)
    }

    async fn read_record(&self, name: &str) -> Result<ImageRecord, StorageError> {
        let stat = self.storage.stat(name).await?;
        Ok(ImageRecord {
            url: self.url_for(name),
            name: name.to_string(),
            created_at: stat.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryStorage, LocalFileStorage};

    const BASE: &str = "http://localhost:3000/";

    async fn seeded(names: &[&str]) -> (Arc<InMemoryStorage>, ImageIndex) {
        let storage = Arc::new(InMemoryStorage::new());
        for name in names {
            storage.write(name, vec![0; 10]).await.unwrap();
        }
        let index = ImageIndex::new(storage.clone(), BASE);
        (storage, index)
    }

    #[tokio::test]
    async fn initialize_mirrors_the_backend() {
        let (_storage, index) = seeded(&["a.png", "b.jpg", "c.gif"]).await;
        index.initialize().await.unwrap();

        let listed = index.list().await;
        assert_eq!(
            listed.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["a.png", "b.jpg", "c.gif"]
        );
        for (name, record) in &listed {
            assert_eq!(&record.name, name);
        }
    }

    #[tokio::test]
    async fn initialize_reflects_current_disk_state_when_rerun() {
        let (storage, index) = seeded(&["a.png", "b.png"]).await;
        index.initialize().await.unwrap();

        storage.delete("a.png").await.unwrap();
        storage.write("c.png", vec![1]).await.unwrap();
        index.initialize().await.unwrap();

        let listed = index.list().await;
        assert!(!listed.contains_key("a.png"));
        assert!(listed.contains_key("b.png"));
        assert!(listed.contains_key("c.png"));
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn initialize_reads_a_real_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.png"), b"x").unwrap();
        std::fs::write(dir.path().join("two.svg"), b"<svg/>").unwrap();

        let storage = Arc::new(LocalFileStorage::new(dir.path().to_path_buf()).unwrap());
        let index = ImageIndex::new(storage, BASE);
        index.initialize().await.unwrap();

        assert_eq!(index.len().await, 2);
        let record = index.get("one.png").await.unwrap();
        assert!(record.created_at > 0);
    }

    #[tokio::test]
    async fn create_entry_twice_keeps_one_record() {
        let (_storage, index) = seeded(&["a.png"]).await;
        index.create_entry("a.png").await.unwrap();
        index.create_entry("a.png").await.unwrap();

        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn create_entry_for_missing_file_fails_and_leaves_index_alone() {
        let (_storage, index) = seeded(&["a.png"]).await;
        index.initialize().await.unwrap();

        let err = index.create_entry("ghost.png").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn delete_entry_ignores_absent_names() {
        let (_storage, index) = seeded(&["a.png"]).await;
        index.initialize().await.unwrap();
        let before = index.list().await;

        index.delete_entry("ghost.png").await;

        assert_eq!(index.list().await, before);
    }

    #[tokio::test]
    async fn rename_entry_moves_the_key() {
        let (storage, index) = seeded(&["abc123.png"]).await;
        index.initialize().await.unwrap();

        storage.rename("abc123.png", "new.png").await.unwrap();
        index.rename_entry("abc123.png", "new.png").await.unwrap();

        let listed = index.list().await;
        assert!(!listed.contains_key("abc123.png"));
        assert_eq!(listed["new.png"].url, format!("{BASE}new.png"));
    }

    #[tokio::test]
    async fn rename_entry_drops_old_name_when_new_one_cannot_be_read() {
        let (_storage, index) = seeded(&["a.png"]).await;
        index.initialize().await.unwrap();

        let err = index.rename_entry("a.png", "missing.png").await.unwrap_err();

        assert!(matches!(err, StorageError::NotFound(_)));
        assert_eq!(index.len().await, 0);
    }

    #[tokio::test]
    async fn urls_are_base_plus_name() {
        for base in ["https://img.example.com/", "http://x/p/", ""] {
            let storage = Arc::new(InMemoryStorage::new());
            storage.write("pic.gif", vec![1]).await.unwrap();
            let index = ImageIndex::new(storage, base);
            index.initialize().await.unwrap();

            assert_eq!(index.get("pic.gif").await.unwrap().url, format!("{base}pic.gif"));
        }
    }

    #[test]
    fn records_serialize_with_camel_case() {
        let record = ImageRecord {
            url: "u".into(),
            name: "n".into(),
            created_at: 42,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["createdAt"], 42);
    }
}
