//! Cache Module
//!
//! Two layers:
//! - [`CacheBackend`]: raw key/payload persistence (memory here, snapshot files on the server)
//! - [`CacheStore`]: typed, timestamped entries that never fail the read path

pub mod backend;
pub mod store;

pub use backend::{CacheBackend, MemoryBackend};
pub use store::{CacheEntry, CacheStore, DEFAULT_IO_TIMEOUT};
