//! Storage backends for the data lake.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::DataLakeError;

/// Backend capable of storing blobs under hierarchical path segments.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `path`, overwriting any previous value.
    async fn store(&self, data: &[u8], path: &[String]) -> Result<(), DataLakeError>;

    /// Whether a blob exists under `path`.
    async fn is_stored(&self, path: &[String]) -> Result<bool, DataLakeError>;

    /// Retrieve the blob stored under `path`.
    async fn retrieve(&self, path: &[String]) -> Result<Vec<u8>, DataLakeError>;
}

/// Filesystem-backed storage. Path segments map to directories, the last
/// segment to a file.
pub struct FileStorage {
    directory: PathBuf,
}

impl FileStorage {
    /// Create the storage rooted at `dir`, creating the directory if needed.
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, DataLakeError> {
        let directory = dir.into();
        tokio::fs::create_dir_all(&directory).await?;
        Ok(Self { directory })
    }

    fn file_name(&self, path: &[String]) -> PathBuf {
        let mut full = self.directory.clone();
        for segment in path {
            full.push(segment);
        }
        full
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn store(&self, data: &[u8], path: &[String]) -> Result<(), DataLakeError> {
        let file = self.file_name(path);
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file, data).await?;
        Ok(())
    }

    async fn is_stored(&self, path: &[String]) -> Result<bool, DataLakeError> {
        match tokio::fs::metadata(self.file_name(path)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn retrieve(&self, path: &[String]) -> Result<Vec<u8>, DataLakeError> {
        let file = self.file_name(path);
        match tokio::fs::read(&file).await {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(DataLakeError::NotFound {
                path: display_path(&file),
            }),
            Err(err) => Err(err.into()),
        }
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// In-memory storage for tests and ephemeral indexers. All data is lost
/// when the process exits.
#[derive(Default)]
pub struct MemoryStorage {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(path: &[String]) -> String {
        path.join("/")
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn store(&self, data: &[u8], path: &[String]) -> Result<(), DataLakeError> {
        self.blobs
            .lock()
            .unwrap()
            .insert(Self::key(path), data.to_vec());
        Ok(())
    }

    async fn is_stored(&self, path: &[String]) -> Result<bool, DataLakeError> {
        Ok(self.blobs.lock().unwrap().contains_key(&Self::key(path)))
    }

    async fn retrieve(&self, path: &[String]) -> Result<Vec<u8>, DataLakeError> {
        self.blobs
            .lock()
            .unwrap()
            .get(&Self::key(path))
            .cloned()
            .ok_or_else(|| DataLakeError::NotFound {
                path: Self::key(path),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(path: &[&str]) -> Vec<String> {
        path.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        let path = segments(&["mainnet", "ethereum", "block"]);

        assert!(!storage.is_stored(&path).await.unwrap());
        storage.store(b"blob", &path).await.unwrap();
        assert!(storage.is_stored(&path).await.unwrap());
        assert_eq!(storage.retrieve(&path).await.unwrap(), b"blob");
    }

    #[tokio::test]
    async fn memory_storage_missing_blob_is_not_found() {
        let storage = MemoryStorage::new();
        let err = storage
            .retrieve(&segments(&["nope"]))
            .await
            .unwrap_err();
        assert!(matches!(err, DataLakeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).await.unwrap();
        let path = segments(&["mainnet", "ethereum", "height", "42", "block"]);

        assert!(!storage.is_stored(&path).await.unwrap());
        storage.store(b"raw block", &path).await.unwrap();
        assert!(storage.is_stored(&path).await.unwrap());
        assert_eq!(storage.retrieve(&path).await.unwrap(), b"raw block");
    }

    #[tokio::test]
    async fn file_storage_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).await.unwrap();
        let path = segments(&["a", "b"]);

        storage.store(b"one", &path).await.unwrap();
        storage.store(b"two", &path).await.unwrap();
        assert_eq!(storage.retrieve(&path).await.unwrap(), b"two");
    }
}
