//! In-memory blob store for development and tests

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{object_key, BlobStore};
use crate::error::Result;

/// Blob store backed by a process-local map
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, area: &str, namespace: &str, key: &str, bytes: Vec<u8>) -> Result<()> {
        let mut objects = self.objects.write().await;
        objects.insert(object_key(area, namespace, key), bytes);
        Ok(())
    }

    async fn get(&self, area: &str, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let objects = self.objects.read().await;
        Ok(objects.get(&object_key(area, namespace, key)).cloned())
    }

    async fn delete(&self, area: &str, namespace: &str, key: &str) -> Result<()> {
        let mut objects = self.objects.write().await;
        objects.remove(&object_key(area, namespace, key));
        Ok(())
    }
}
