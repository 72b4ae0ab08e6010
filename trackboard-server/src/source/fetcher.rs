use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};
use trackboard_core::{Contributor, FetchResult, Fetcher, Item};

use super::types::{Enrichment, EnrichmentSource, ListingSource, ScrapedEntry};
use crate::metrics;

/// Largest batch the catalog accepts
pub const MAX_BATCH_SIZE: usize = 50;
/// Pause between successive catalog calls
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_TRACK_URL_BASE: &str = "https://open.spotify.com/track/";

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub batch_size: usize,
    pub batch_delay: Duration,
    /// Prefix of the canonical item link; the track id is appended
    pub track_url_base: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
            track_url_base: DEFAULT_TRACK_URL_BASE.to_string(),
        }
    }
}

impl FetcherConfig {
    /// Clamped to `1..=MAX_BATCH_SIZE`
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub fn with_batch_delay(mut self, batch_delay: Duration) -> Self {
        self.batch_delay = batch_delay;
        self
    }

    pub fn with_track_url_base(mut self, track_url_base: impl Into<String>) -> Self {
        self.track_url_base = track_url_base.into();
        self
    }
}

/// Scrapes the listing and enriches it batch by batch.
///
/// Only the listing can fail the fetch. A failed catalog batch leaves its
/// tracks with the scraped artist name and no artwork.
pub struct SourceFetcher<L, E> {
    listing: L,
    catalog: E,
    config: FetcherConfig,
}

impl<L, E> SourceFetcher<L, E>
where
    L: ListingSource,
    E: EnrichmentSource,
{
    pub fn new(listing: L, catalog: E, config: FetcherConfig) -> Self {
        Self {
            listing,
            catalog,
            config,
        }
    }

    /// Look up every scraped id, one batch at a time
    async fn enrich(&self, entries: &[ScrapedEntry]) -> HashMap<String, Enrichment> {
        let ids: Vec<String> = entries
            .iter()
            .filter(|entry| !entry.id.is_empty())
            .map(|entry| entry.id.clone())
            .collect();

        let mut index = HashMap::with_capacity(ids.len());
        let batch_size = self.config.batch_size.clamp(1, MAX_BATCH_SIZE);

        for (batch_no, batch) in ids.chunks(batch_size).enumerate() {
            if batch_no > 0 {
                tokio::time::sleep(self.config.batch_delay).await;
            }

            match self.catalog.lookup(batch).await {
                Ok(found) => index.extend(found),
                Err(e) => {
                    metrics::record_batch_failure();
                    warn!(
                        "EnrichmentBatchError: batch {} ({} ids) skipped: {}",
                        batch_no,
                        batch.len(),
                        e
                    );
                }
            }
        }

        index
    }
}

#[async_trait]
impl<L, E> Fetcher for SourceFetcher<L, E>
where
    L: ListingSource,
    E: EnrichmentSource,
{
    type Output = Vec<Item>;

    async fn fetch(&self) -> FetchResult<Vec<Item>> {
        let started = Instant::now();
        let entries = match self.listing.listing().await {
            Ok(entries) => entries,
            Err(e) => {
                metrics::record_fetch("error", started.elapsed().as_secs_f64());
                return Err(e);
            }
        };
        let index = self.enrich(&entries).await;
        metrics::record_fetch("success", started.elapsed().as_secs_f64());

        info!(
            "Enriched {}/{} chart entries",
            entries.iter().filter(|e| index.contains_key(&e.id)).count(),
            entries.len()
        );
        Ok(apply_enrichment(entries, &index, &self.config.track_url_base))
    }
}

/// Build the served items from scraped rows and whatever enrichment was found
pub fn apply_enrichment(
    entries: Vec<ScrapedEntry>,
    index: &HashMap<String, Enrichment>,
    track_url_base: &str,
) -> Vec<Item> {
    entries
        .into_iter()
        .map(|entry| {
            let (contributors, images) = match index.get(&entry.id) {
                Some(found) => (found.contributors.clone(), found.images.clone()),
                None => (vec![Contributor::named(entry.artist)], Vec::new()),
            };
            let link = if entry.id.is_empty() {
                String::new()
            } else {
                format!("{}{}", track_url_base, entry.id)
            };

            Item {
                rank: entry.rank,
                rank_delta: entry.rank_delta,
                title: entry.title,
                link,
                id: entry.id,
                contributors,
                images,
                streams: entry.streams,
                total_streams: entry.total_streams,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::types::EnrichmentError;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::time::Instant;
    use trackboard_core::{FetchError, Image, RankDelta};

    fn scraped(count: u32) -> Vec<ScrapedEntry> {
        (1..=count)
            .map(|rank| ScrapedEntry {
                rank,
                rank_delta: RankDelta::Unchanged,
                title: format!("Song {}", rank),
                artist: format!("Artist {}", rank),
                id: format!("id{}", rank),
                streams: 1000 - rank as u64,
                total_streams: 10_000,
            })
            .collect()
    }

    struct FakeListing(FetchResult<Vec<ScrapedEntry>>);

    #[async_trait]
    impl ListingSource for FakeListing {
        async fn listing(&self) -> FetchResult<Vec<ScrapedEntry>> {
            self.0.clone()
        }
    }

    /// Records each batch and when it arrived; fails the batches listed in `failing`
    #[derive(Clone, Default)]
    struct FakeCatalog {
        calls: Arc<Mutex<Vec<(Instant, Vec<String>)>>>,
        failing: Vec<usize>,
    }

    #[async_trait]
    impl EnrichmentSource for FakeCatalog {
        async fn lookup(
            &self,
            ids: &[String],
        ) -> Result<HashMap<String, Enrichment>, EnrichmentError> {
            let batch_no = {
                let mut calls = self.calls.lock();
                calls.push((Instant::now(), ids.to_vec()));
                calls.len() - 1
            };
            if self.failing.contains(&batch_no) {
                return Err(EnrichmentError::Token("catalog down".to_string()));
            }

            Ok(ids
                .iter()
                .map(|id| {
                    let enrichment = Enrichment {
                        contributors: vec![Contributor {
                            name: format!("Enriched {}", id),
                            link: format!("https://open.spotify.com/artist/{}", id),
                        }],
                        images: vec![Image {
                            url: format!("https://img/{}", id),
                            width: 640,
                            height: 640,
                        }],
                    };
                    (id.clone(), enrichment)
                })
                .collect())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_keeps_scraped_data() {
        let catalog = FakeCatalog {
            failing: vec![1],
            ..Default::default()
        };
        let fetcher = SourceFetcher::new(
            FakeListing(Ok(scraped(100))),
            catalog.clone(),
            FetcherConfig::default(),
        );

        let items = fetcher.fetch().await.unwrap();
        assert_eq!(items.len(), 100);

        assert_eq!(items[0].contributors[0].name, "Enriched id1");
        assert_eq!(items[49].images.len(), 1);

        assert_eq!(items[50].contributors, vec![Contributor::named("Artist 51")]);
        assert!(items[50].images.is_empty());
        assert_eq!(items[99].contributors[0].link, "");

        let ranks: Vec<u32> = items.iter().map(|i| i.rank).collect();
        assert_eq!(ranks, (1..=100).collect::<Vec<_>>());
        assert_eq!(catalog.calls.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_are_spaced_by_delay() {
        let catalog = FakeCatalog::default();
        let fetcher = SourceFetcher::new(
            FakeListing(Ok(scraped(120))),
            catalog.clone(),
            FetcherConfig::default(),
        );

        let started = Instant::now();
        fetcher.fetch().await.unwrap();
        let elapsed = started.elapsed();

        let calls = catalog.calls.lock();
        let sizes: Vec<usize> = calls.iter().map(|(_, ids)| ids.len()).collect();
        assert_eq!(sizes, vec![50, 50, 20]);

        // No delay before the first call or after the last
        assert_eq!(calls[0].0, started);
        assert_eq!(calls[1].0 - calls[0].0, DEFAULT_BATCH_DELAY);
        assert_eq!(calls[2].0 - calls[1].0, DEFAULT_BATCH_DELAY);
        assert_eq!(elapsed, DEFAULT_BATCH_DELAY * 2);
    }

    #[tokio::test]
    async fn test_batch_size_is_capped() {
        let catalog = FakeCatalog::default();
        let config = FetcherConfig::default()
            .with_batch_size(500)
            .with_batch_delay(Duration::ZERO);
        assert_eq!(config.batch_size, MAX_BATCH_SIZE);

        let fetcher = SourceFetcher::new(FakeListing(Ok(scraped(100))), catalog.clone(), config);
        fetcher.fetch().await.unwrap();
        assert_eq!(catalog.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_listing_failure_fails_fetch() {
        let catalog = FakeCatalog::default();
        let fetcher = SourceFetcher::new(
            FakeListing(Err(FetchError::SourceUnavailable("503".to_string()))),
            catalog.clone(),
            FetcherConfig::default(),
        );

        assert!(matches!(
            fetcher.fetch().await,
            Err(FetchError::SourceUnavailable(_))
        ));
        assert!(catalog.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_entries_without_id_skip_catalog() {
        let mut entries = scraped(3);
        entries[1].id.clear();

        let catalog = FakeCatalog::default();
        let fetcher = SourceFetcher::new(
            FakeListing(Ok(entries)),
            catalog.clone(),
            FetcherConfig::default(),
        );

        let items = fetcher.fetch().await.unwrap();
        assert_eq!(catalog.calls.lock()[0].1, vec!["id1", "id3"]);
        assert_eq!(items[1].link, "");
        assert_eq!(items[1].contributors, vec![Contributor::named("Artist 2")]);
    }

    #[test]
    fn test_apply_enrichment_is_pure() {
        let entries = scraped(2);
        let mut index = HashMap::new();
        index.insert(
            "id2".to_string(),
            Enrichment {
                contributors: vec![Contributor::named("Someone")],
                images: vec![],
            },
        );

        let items = apply_enrichment(entries.clone(), &index, "https://t/");
        assert_eq!(items[0].link, "https://t/id1");
        assert_eq!(items[0].contributors, vec![Contributor::named("Artist 1")]);
        assert_eq!(items[1].contributors, vec![Contributor::named("Someone")]);

        // Inputs are untouched and a second pass gives the same result
        assert_eq!(entries, scraped(2));
        assert_eq!(apply_enrichment(entries, &index, "https://t/"), items);
    }
}
