//! # Trackboard Rust SDK
//!
//! Client for the Trackboard daily chart server.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trackboard_sdk::{ChartFeed, TrackboardClient, TrackboardConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TrackboardConfig::new("http://localhost:15600").with_auth_token("secret");
//!     let client = TrackboardClient::new(config)?;
//!
//!     // One-off request
//!     let chart = client.chart().await?;
//!     println!("{} tracks ({:?})", chart.items.len(), chart.cache_state);
//!
//!     // Cached locally until the next cutover
//!     let feed = ChartFeed::new(client);
//!     let served = feed.items().await?;
//!     println!("#1: {}", served.data[0].title);
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod feed;

pub use client::{Chart, RefreshResult, TrackboardClient, TrackboardConfig};
pub use error::{Result, TrackboardError};
pub use feed::{ChartFeed, RemoteChart};
pub use trackboard_core::{CacheStatus, Contributor, Image, Item, RankDelta, RefreshState};
