use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::FetchResult;

/// Produces a complete, fresh dataset.
///
/// The server tier implements this by scraping and enriching the chart; the
/// client tier by calling the server's read surface.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    type Output: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;

    async fn fetch(&self) -> FetchResult<Self::Output>;
}
