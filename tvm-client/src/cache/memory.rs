use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use tokio::sync::RwLock;

use crate::types::CredentialRecord;

static GLOBAL: LazyLock<MemoryCache> = LazyLock::new(MemoryCache::new);

/// In-process credential cache.
///
/// Cloning the handle shares the underlying map. Entries are only ever
/// replaced, never evicted; expiry is checked by the caller.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CredentialRecord>>>,
}

impl MemoryCache {
    /// A fresh, isolated store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide store used by clients that are not given their own.
    pub fn global() -> Self {
        GLOBAL.clone()
    }

    pub async fn get(&self, key: &str) -> Option<CredentialRecord> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn put(&self, key: &str, record: CredentialRecord) {
        self.entries.write().await.insert(key.to_string(), record);
    }

    /// Drop every entry.
    pub async fn reset(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Whether two handles share the same store.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}
