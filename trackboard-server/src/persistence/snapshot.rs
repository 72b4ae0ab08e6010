//! File-backed cache backend.
//!
//! Each key is one JSON envelope `{expiresAt, payload}` under the snapshot
//! directory. Writes go to a temp file that is renamed over the target, so a
//! reader always sees either the previous or the new complete envelope.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use trackboard_core::{CacheBackend, CacheIoError, Clock};

/// Default absolute expiry of a written envelope
pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(48 * 3600);

#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub directory: PathBuf,
    pub ttl: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./data/cache"),
            ttl: DEFAULT_SNAPSHOT_TTL,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    expires_at: DateTime<Utc>,
    payload: String,
}

/// Persistent [`CacheBackend`] keeping one file per key
pub struct SnapshotBackend {
    config: SnapshotConfig,
    clock: Arc<dyn Clock>,
    write_seq: AtomicU64,
}

impl SnapshotBackend {
    pub fn new(config: SnapshotConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            write_seq: AtomicU64::new(0),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.config.directory
    }

    /// File holding `key`; anything outside `[A-Za-z0-9_-]` becomes `_`
    fn path_for(&self, key: &str) -> Result<PathBuf, CacheIoError> {
        if key.is_empty() {
            return Err(CacheIoError::InvalidKey(key.to_string()));
        }
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        Ok(self.config.directory.join(format!("{}.json", name)))
    }

    /// Read the live payload under `key`. With `prune`, an expired or corrupt
    /// file is deleted as well as skipped.
    async fn read(&self, key: &str, prune: bool) -> Result<Option<String>, CacheIoError> {
        let path = self.path_for(key)?;

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let envelope: Envelope = match serde_json::from_str(&content) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Skipping corrupt snapshot {:?}: {}", path, e);
                if prune {
                    self.discard(&path).await;
                }
                return Ok(None);
            }
        };

        if envelope.expires_at <= self.clock.now() {
            debug!("Snapshot for key={} expired at {}", key, envelope.expires_at);
            if prune {
                self.discard(&path).await;
            }
            return Ok(None);
        }

        Ok(Some(envelope.payload))
    }

    async fn discard(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove snapshot {:?}: {}", path, e);
            }
        }
    }
}

#[async_trait]
impl CacheBackend for SnapshotBackend {
    async fn load(&self, key: &str) -> Result<Option<String>, CacheIoError> {
        self.read(key, true).await
    }

    async fn peek(&self, key: &str) -> Result<Option<String>, CacheIoError> {
        self.read(key, false).await
    }

    async fn save(&self, key: &str, payload: String) -> Result<(), CacheIoError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.config.directory).await?;

        let ttl = chrono::Duration::from_std(self.config.ttl)
            .unwrap_or_else(|_| chrono::Duration::hours(48));
        let envelope = Envelope {
            expires_at: self.clock.now() + ttl,
            payload,
        };
        let bytes = serde_json::to_vec(&envelope)?;

        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let tmp_path = path.with_extension(format!("json.{}.tmp", seq));

        if let Err(e) = write_and_rename(&tmp_path, &path, &bytes).await {
            self.discard(&tmp_path).await;
            return Err(e.into());
        }

        debug!("Wrote snapshot for key={} ({} bytes)", key, bytes.len());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheIoError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_and_rename(tmp_path: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(tmp_path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(tmp_path, path).await
}
