use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

use super::{ObjectStorage, StorageError};

/// Filesystem-backed storage (`STORAGE_BACKEND=local`). Objects live under a
/// root directory shared with the inference process, so `url_for` returns a
/// plain absolute path it can open directly.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(&self, data: &[u8], key: &str, _content_type: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn url_for(&self, key: &str) -> String {
        self.path_for(key).to_string_lossy().into_owned()
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf());

        storage
            .put(b"weights", "models/u1/abcd.h5", "application/octet-stream")
            .await
            .unwrap();
        assert_eq!(storage.get("models/u1/abcd.h5").await.unwrap(), b"weights");

        let locator = storage.url_for("models/u1/abcd.h5");
        assert!(locator.ends_with("models/u1/abcd.h5"));
        assert!(std::path::Path::new(&locator).exists());

        storage.delete("models/u1/abcd.h5").await.unwrap();
        assert!(matches!(
            storage.get("models/u1/abcd.h5").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.delete("models/u1/abcd.h5").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
