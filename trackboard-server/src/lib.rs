//! # Trackboard server
//!
//! Scrapes the daily chart listing, enriches it from the catalog, keeps the
//! result in a persistent snapshot cache and serves it over HTTP.

pub mod auth;
pub mod config;
pub mod metrics;
pub mod persistence;
pub mod server;
pub mod source;

// Re-export commonly used types
pub use auth::BearerAuth;
pub use config::{ConfigError, Secrets, ServerConfig};
pub use persistence::{SnapshotBackend, SnapshotConfig};
pub use server::{ApiError, AppState, create_router};
pub use source::{
    CatalogClient, ChartFetcher, ChartPage, EnrichmentError, FetcherConfig, SourceFetcher,
};
