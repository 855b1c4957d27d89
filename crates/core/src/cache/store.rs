//! Key/value persistence contract used by the loader.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::key::CacheKey;
use crate::Error;

/// String-keyed persistence supplied by the host.
///
/// Writes are last-write-wins; no atomicity across keys is expected.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, Error>;

    async fn set(&self, key: &CacheKey, value: &str) -> Result<(), Error>;

    async fn remove(&self, key: &CacheKey) -> Result<(), Error>;
}

/// Process-local store backed by a map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<CacheKey, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, Error> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &CacheKey, value: &str) -> Result<(), Error> {
        self.entries.write().await.insert(key.clone(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), Error> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
