//! # Trackboard core
//!
//! The freshness policy and refresh pipeline shared by the Trackboard server
//! and its clients. Both tiers plug their own [`CacheBackend`] and
//! [`Fetcher`] into the same [`RefreshOrchestrator`], so the decision of
//! when to serve cached chart data and when to rebuild it is made in exactly
//! one place.

pub mod cache;
pub mod error;
pub mod fetcher;
pub mod freshness;
pub mod model;
pub mod orchestrator;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use cache::{CacheBackend, CacheEntry, CacheStore, MemoryBackend};
pub use error::{CacheIoError, FetchError, FetchResult, ReadError};
pub use fetcher::Fetcher;
pub use freshness::{CacheStatus, Clock, FreshnessPolicy, ManualClock, SystemClock};
pub use model::{Contributor, Image, Item, RankDelta};
pub use orchestrator::{OrchestratorConfig, RefreshOrchestrator, RefreshState, Served};
pub use scheduler::{RefreshScheduler, SchedulerConfig, SchedulerHandle, TickOutcome};

/// Cache key under which the daily chart is stored
pub const CHART_KEY: &str = "chart:global:daily";
