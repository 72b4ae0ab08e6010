use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::CacheIoError;

/// Raw persistence for serialized cache entries.
///
/// Implementations hold at most one payload per key and replace it whole on
/// `save`; a concurrent `load` sees either the previous payload or the new
/// one, never a mix.
#[async_trait]
pub trait CacheBackend: Send + Sync + 'static {
    /// Load the payload stored under `key`
    async fn load(&self, key: &str) -> Result<Option<String>, CacheIoError>;

    /// Like [`load`](Self::load), but never modifies what is stored.
    ///
    /// Backends that prune unusable payloads on `load` skip that here.
    async fn peek(&self, key: &str) -> Result<Option<String>, CacheIoError> {
        self.load(key).await
    }

    /// Replace the payload stored under `key`
    async fn save(&self, key: &str, payload: String) -> Result<(), CacheIoError>;

    /// Drop whatever is stored under `key`
    async fn remove(&self, key: &str) -> Result<(), CacheIoError>;
}

#[derive(Debug, Clone)]
struct StoredPayload {
    payload: String,
    expires_at: Option<Instant>,
}

impl StoredPayload {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires| Instant::now() >= expires)
    }
}

/// Ephemeral in-process backend, used by the client tier and in tests
#[derive(Clone, Default)]
pub struct MemoryBackend {
    data: Arc<RwLock<HashMap<String, StoredPayload>>>,
    ttl: Option<Duration>,
}

impl MemoryBackend {
    /// Create a backend whose entries never expire on their own
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that drops entries `ttl` after they were saved
    pub fn with_ttl(ttl: Duration) -> Self {
        info!("Initializing memory cache backend with ttl={:?}", ttl);
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            ttl: Some(ttl),
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.data.read().values().filter(|v| !v.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn load(&self, key: &str) -> Result<Option<String>, CacheIoError> {
        {
            let data = self.data.read();
            match data.get(key) {
                Some(stored) if !stored.is_expired() => return Ok(Some(stored.payload.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        debug!("Memory cache key expired: {}", key);
        self.data.write().remove(key);
        Ok(None)
    }

    async fn save(&self, key: &str, payload: String) -> Result<(), CacheIoError> {
        debug!("Memory cache SET key={}, size={}", key, payload.len());
        let stored = StoredPayload {
            payload,
            expires_at: self.ttl.map(|ttl| Instant::now() + ttl),
        };
        self.data.write().insert(key.to_string(), stored);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheIoError> {
        self.data.write().remove(key);
        Ok(())
    }
}
