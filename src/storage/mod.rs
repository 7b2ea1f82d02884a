//! Blob storage for converted artifacts
//!
//! Artifacts are addressed by (area, namespace, key); the conversion
//! service derives the key from the resource identity so re-converting a
//! page overwrites the same slot.

mod memory;
mod s3;

pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{StorageConfig, StorageProvider};
use crate::error::Result;

/// Content-addressed blob store collaborator
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes at the composite key, replacing any prior blob
    async fn put(&self, area: &str, namespace: &str, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Fetch a blob; absence is not an error
    async fn get(&self, area: &str, namespace: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove a blob; idempotent
    async fn delete(&self, area: &str, namespace: &str, key: &str) -> Result<()>;
}

/// Flatten the composite key into a single object path
pub(crate) fn object_key(area: &str, namespace: &str, key: &str) -> String {
    format!("{}/{}/{}", area, namespace, key)
}

/// Build the configured blob store implementation
pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    match config.provider {
        StorageProvider::Memory => Ok(Arc::new(MemoryBlobStore::new())),
        _ => Ok(Arc::new(S3BlobStore::new(config).await?)),
    }
}
