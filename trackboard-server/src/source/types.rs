use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use trackboard_core::{Contributor, FetchResult, Image, RankDelta};

/// One row of the primary listing, before enrichment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedEntry {
    pub rank: u32,
    pub rank_delta: RankDelta,
    pub title: String,
    /// Artist name as printed in the listing
    pub artist: String,
    /// Track identifier, empty when the row carried no track link
    pub id: String,
    pub streams: u64,
    pub total_streams: u64,
}

/// Catalog metadata for one track
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Enrichment {
    pub contributors: Vec<Contributor>,
    pub images: Vec<Image>,
}

/// One enrichment batch failed; the rest of the fetch carries on
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Catalog returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Token request failed: {0}")]
    Token(String),
}

/// Produces the ranked listing
#[async_trait]
pub trait ListingSource: Send + Sync + 'static {
    async fn listing(&self) -> FetchResult<Vec<ScrapedEntry>>;
}

/// Looks up catalog metadata for up to one batch of track identifiers.
///
/// Identifiers the catalog does not know are simply missing from the map.
#[async_trait]
pub trait EnrichmentSource: Send + Sync + 'static {
    async fn lookup(&self, ids: &[String]) -> Result<HashMap<String, Enrichment>, EnrichmentError>;
}
