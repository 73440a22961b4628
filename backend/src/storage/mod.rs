pub mod local_service;
pub mod s3_service;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 error: {0}")]
    S3(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("File too large")]
    FileTooLarge,
}

/// key -> bytes capability set over whichever store backs uploads. `url_for`
/// yields the locator handed to the inference service as `model_path`.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, data: &[u8], key: &str, content_type: &str) -> Result<(), StorageError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;
    fn url_for(&self, key: &str) -> String;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

const MAX_UPLOAD_SIZE: usize = 512 * 1024 * 1024;

pub fn validate_upload_size(data: &[u8]) -> Result<(), StorageError> {
    if data.len() > MAX_UPLOAD_SIZE {
        return Err(StorageError::FileTooLarge);
    }
    Ok(())
}

pub fn calculate_file_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Weights objects are keyed by content hash so re-uploads of identical bytes
/// land on the same object.
pub fn model_key(owner_id: Uuid, file_hash: &str, extension: &str) -> String {
    format!("models/{}/{}.{}", owner_id, file_hash, extension)
}

pub fn readme_key(owner_id: Uuid, slug: &str) -> String {
    format!("readmes/{}/{}.md", owner_id, slug)
}

/// Extension of the uploaded weights filename, falling back to "bin" when the
/// client sent none.
pub fn file_extension(filename: &str) -> &str {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .unwrap_or("bin")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_owner() {
        let owner = Uuid::new_v4();
        let key = model_key(owner, "deadbeef", "h5");
        assert_eq!(key, format!("models/{}/deadbeef.h5", owner));
        assert_eq!(
            readme_key(owner, "my-model-12ab34cd"),
            format!("readmes/{}/my-model-12ab34cd.md", owner)
        );
    }

    #[test]
    fn extension_fallback() {
        assert_eq!(file_extension("weights.h5"), "h5");
        assert_eq!(file_extension("model.tar.gz"), "gz");
        assert_eq!(file_extension("no-extension"), "bin");
        assert_eq!(file_extension("trailing-dot."), "bin");
    }

    #[test]
    fn hash_is_stable_hex() {
        let a = calculate_file_hash(b"abc");
        assert_eq!(a.len(), 64);
        assert_eq!(a, calculate_file_hash(b"abc"));
        assert_ne!(a, calculate_file_hash(b"abd"));
    }
}
