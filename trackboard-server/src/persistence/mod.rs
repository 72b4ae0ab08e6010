//! Persistent storage for the server tier

pub mod snapshot;

pub use snapshot::{DEFAULT_SNAPSHOT_TTL, SnapshotBackend, SnapshotConfig};
