use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::backend::CacheBackend;
use crate::error::CacheIoError;
use crate::freshness::Clock;

/// Default bound on a single backend call
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// A stored dataset and the instant it was written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

/// Typed, timestamped view over a [`CacheBackend`].
///
/// Nothing here returns an error: backend failures are logged and read as a
/// miss, and a payload that no longer deserializes is dropped.
pub struct CacheStore<T> {
    backend: Arc<dyn CacheBackend>,
    clock: Arc<dyn Clock>,
    io_timeout: Duration,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for CacheStore<T> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            clock: self.clock.clone(),
            io_timeout: self.io_timeout,
            _marker: PhantomData,
        }
    }
}

impl<T> CacheStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(backend: Arc<dyn CacheBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            io_timeout: DEFAULT_IO_TIMEOUT,
            _marker: PhantomData,
        }
    }

    /// Set the bound applied to every backend call
    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Load the entry under `key`, dropping it if it is malformed
    pub async fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        self.read(key, true).await
    }

    /// Load the entry under `key` without modifying the backend
    pub async fn peek(&self, key: &str) -> Option<CacheEntry<T>> {
        self.read(key, false).await
    }

    /// Store `value` stamped with the current instant.
    ///
    /// Returns the stamp on success, `None` if the write was lost.
    pub async fn set(&self, key: &str, value: &T) -> Option<DateTime<Utc>> {
        let cached_at = self.clock.now();
        let entry = CacheEntry {
            data: value,
            cached_at,
        };

        let payload = match serde_json::to_string(&entry) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize cache entry for key={}: {}", key, e);
                return None;
            }
        };

        match self.bounded(self.backend.save(key, payload)).await {
            Ok(()) => {
                debug!("Cache SET key={}, cached_at={}", key, cached_at);
                Some(cached_at)
            }
            Err(e) => {
                warn!("Cache write failed for key={}: {}", key, e);
                None
            }
        }
    }

    async fn read(&self, key: &str, drop_invalid: bool) -> Option<CacheEntry<T>> {
        let load = if drop_invalid {
            self.backend.load(key)
        } else {
            self.backend.peek(key)
        };
        let payload = match self.bounded(load).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache read failed for key={}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry<T>>(&payload) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Discarding malformed cache entry for key={}: {}", key, e);
                if drop_invalid {
                    if let Err(e) = self.bounded(self.backend.remove(key)).await {
                        warn!("Failed to drop malformed cache entry key={}: {}", key, e);
                    }
                }
                None
            }
        }
    }

    async fn bounded<R>(
        &self,
        op: impl Future<Output = Result<R, CacheIoError>>,
    ) -> Result<R, CacheIoError> {
        match tokio::time::timeout(self.io_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(CacheIoError::Timeout(self.io_timeout)),
        }
    }
}
