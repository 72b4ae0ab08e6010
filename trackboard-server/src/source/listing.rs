//! Primary listing scrape.
//!
//! The listing is an HTML table whose data rows carry, in order: position,
//! position change, "Artist - Title" (with a track link), days on chart,
//! peak, peak count, streams, streams change, 7-day streams, 7-day change
//! and total streams.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};
use trackboard_core::{FetchError, FetchResult, RankDelta};

use super::types::{ListingSource, ScrapedEntry};

/// Rows taken from the top of the listing
pub const DEFAULT_LISTING_LIMIT: usize = 100;

const COL_RANK: usize = 0;
const COL_DELTA: usize = 1;
const COL_ARTIST_TITLE: usize = 2;
const COL_STREAMS: usize = 6;
const COL_TOTAL: usize = 10;

lazy_static! {
    static ref ROW: Regex = Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").unwrap();
    static ref CELL: Regex = Regex::new(r"(?is)<td[^>]*>(.*?)</td>").unwrap();
    static ref ANCHOR: Regex = Regex::new(r#"(?is)<a\s[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#).unwrap();
    static ref TRACK_ID: Regex = Regex::new(r"track/([A-Za-z0-9]+)").unwrap();
    static ref TAG: Regex = Regex::new(r"(?s)<[^>]+>").unwrap();
}

#[derive(Debug, Clone)]
pub struct ListingConfig {
    pub url: String,
    pub limit: usize,
    pub timeout: Duration,
}

/// Scrapes the listing over HTTP
pub struct ChartPage {
    client: Client,
    config: ListingConfig,
}

impl ChartPage {
    pub fn new(config: ListingConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::SourceUnavailable(format!("HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ListingSource for ChartPage {
    async fn listing(&self) -> FetchResult<Vec<ScrapedEntry>> {
        debug!("Fetching listing from {}", self.config.url);

        let response = self
            .client
            .get(&self.config.url)
            .send()
            .await
            .map_err(|e| FetchError::SourceUnavailable(format!("listing request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::SourceUnavailable(format!(
                "listing returned status {}",
                status.as_u16()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::SourceUnavailable(format!("listing body: {}", e)))?;

        let entries = parse_listing(&html, self.config.limit);
        if entries.is_empty() {
            return Err(FetchError::SourceUnavailable(
                "listing contained no chart rows".to_string(),
            ));
        }

        info!("Scraped {} listing rows", entries.len());
        Ok(entries)
    }
}

/// Parse up to `limit` data rows out of the listing document.
///
/// Rows without `<td>` cells (headers) are skipped. Unparseable fields fall
/// back to zero or empty; the row itself is kept.
pub fn parse_listing(html: &str, limit: usize) -> Vec<ScrapedEntry> {
    ROW.captures_iter(html)
        .filter_map(|row| {
            let cells: Vec<&str> = CELL
                .captures_iter(&row[1])
                .filter_map(|cell| cell.get(1).map(|m| m.as_str()))
                .collect();
            parse_row(&cells)
        })
        .take(limit)
        .collect()
}

fn parse_row(cells: &[&str]) -> Option<ScrapedEntry> {
    if cells.len() <= COL_ARTIST_TITLE {
        return None;
    }

    let (artist, title, id) = parse_artist_title(cells[COL_ARTIST_TITLE]);

    Some(ScrapedEntry {
        rank: u32::try_from(parse_number(cells[COL_RANK])).unwrap_or(0),
        rank_delta: RankDelta::parse(&text(cells[COL_DELTA])),
        title,
        artist,
        id,
        streams: cells.get(COL_STREAMS).map(|c| parse_number(c)).unwrap_or(0),
        total_streams: cells.get(COL_TOTAL).map(|c| parse_number(c)).unwrap_or(0),
    })
}

/// Split the "Artist - Title" cell; the title comes from the track link when present
fn parse_artist_title(cell: &str) -> (String, String, String) {
    let mut id = String::new();
    let mut linked_title = None;

    for anchor in ANCHOR.captures_iter(cell) {
        if let Some(found) = TRACK_ID.captures(&anchor[1]) {
            id = found[1].to_string();
            linked_title = Some(text(&anchor[2]));
            break;
        }
    }

    let full = text(cell);
    let (artist, title) = match full.split_once(" - ") {
        Some((artist, title)) => (artist.trim().to_string(), title.trim().to_string()),
        None => (String::new(), full.clone()),
    };

    (artist, linked_title.unwrap_or(title), id)
}

fn parse_number(cell: &str) -> u64 {
    text(cell).replace(',', "").parse().unwrap_or(0)
}

/// Strip tags, decode entities, collapse whitespace
fn text(fragment: &str) -> String {
    let stripped = TAG.replace_all(fragment, "");
    let decoded = match htmlescape::decode_html(&stripped) {
        Ok(decoded) => decoded,
        // A stray '&' or unknown entity; keep the cell as written
        Err(_) => stripped.into_owned(),
    };
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
