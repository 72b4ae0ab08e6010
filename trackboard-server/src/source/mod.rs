//! Chart data source: listing scrape plus catalog enrichment

pub mod catalog;
pub mod fetcher;
pub mod listing;
pub mod types;

pub use catalog::{CatalogClient, CatalogConfig};
pub use fetcher::{FetcherConfig, MAX_BATCH_SIZE, SourceFetcher, apply_enrichment};
pub use listing::{ChartPage, ListingConfig, parse_listing};
pub use types::{Enrichment, EnrichmentError, EnrichmentSource, ListingSource, ScrapedEntry};

/// The production fetcher
pub type ChartFetcher = SourceFetcher<ChartPage, CatalogClient>;
