use serde::{Deserialize, Serialize};

/// One ranked track, enriched with catalog metadata where available
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// 1-based chart position
    pub rank: u32,
    /// Movement since the previous chart
    pub rank_delta: RankDelta,
    pub title: String,
    /// Canonical track URL, empty when no identifier was scraped
    pub link: String,
    /// Stable external track identifier
    pub id: String,
    pub contributors: Vec<Contributor>,
    pub images: Vec<Image>,
    /// Plays in the most recent chart window
    pub streams: u64,
    /// Cumulative plays
    pub total_streams: u64,
}

/// Credited artist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub name: String,
    pub link: String,
}

impl Contributor {
    /// Contributor known only by name, as scraped from the listing
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: String::new(),
        }
    }
}

/// Artwork variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// Chart movement token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "places", rename_all = "lowercase")]
pub enum RankDelta {
    Up(u32),
    Down(u32),
    #[default]
    Unchanged,
    New,
    Reentry,
}

impl RankDelta {
    /// Parse a listing token such as `+3`, `-12`, `=`, `NEW` or `RE`.
    ///
    /// Unrecognized tokens map to [`RankDelta::Unchanged`].
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        if token.eq_ignore_ascii_case("new") {
            return Self::New;
        }
        if token.eq_ignore_ascii_case("re") {
            return Self::Reentry;
        }
        if let Some(places) = token.strip_prefix('+') {
            return places.parse().map(Self::Up).unwrap_or_default();
        }
        if let Some(places) = token.strip_prefix('-') {
            return places.parse().map(Self::Down).unwrap_or_default();
        }
        Self::Unchanged
    }
}
