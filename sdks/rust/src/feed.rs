//! Client-side chart cache.
//!
//! [`ChartFeed`] runs the same refresh orchestrator the server uses, with an
//! in-process [`MemoryBackend`] as its store and the server's chart endpoint
//! as its fetcher. Reads between cutovers never leave the process, and a
//! failed refresh keeps serving the last chart that was fetched.

use async_trait::async_trait;
use std::sync::Arc;
use trackboard_core::{
    CHART_KEY, CacheEntry, CacheStatus, CacheStore, Clock, FetchError, FetchResult, Fetcher, Item,
    MemoryBackend, OrchestratorConfig, ReadError, RefreshOrchestrator, Served, SystemClock,
};

use crate::client::TrackboardClient;
use crate::error::TrackboardError;

/// Fetches the chart from a Trackboard server
#[derive(Clone)]
pub struct RemoteChart {
    client: TrackboardClient,
}

impl RemoteChart {
    pub fn new(client: TrackboardClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for RemoteChart {
    type Output = Vec<Item>;

    async fn fetch(&self) -> FetchResult<Vec<Item>> {
        match self.client.chart().await {
            Ok(chart) => Ok(chart.items),
            Err(TrackboardError::HttpError(e)) if e.is_timeout() => {
                Err(FetchError::Timeout(self.client.config().timeout))
            }
            Err(e) => Err(FetchError::SourceUnavailable(e.to_string())),
        }
    }
}

/// Locally cached view of the server's chart
#[derive(Clone)]
pub struct ChartFeed {
    orchestrator: RefreshOrchestrator<RemoteChart>,
}

impl ChartFeed {
    /// Feed on the system clock with default policy
    pub fn new(client: TrackboardClient) -> Self {
        Self::with_clock(client, Arc::new(SystemClock), OrchestratorConfig::default())
    }

    pub fn with_clock(
        client: TrackboardClient,
        clock: Arc<dyn Clock>,
        config: OrchestratorConfig,
    ) -> Self {
        let store = CacheStore::new(Arc::new(MemoryBackend::new()), clock);
        Self {
            orchestrator: RefreshOrchestrator::new(RemoteChart::new(client), store, config),
        }
    }

    /// Current chart, fetched from the server only when the local copy is not servable
    pub async fn items(&self) -> Result<Served<Vec<Item>>, ReadError> {
        self.orchestrator.read(CHART_KEY).await
    }

    /// Policy view of the local copy
    pub async fn status(&self) -> CacheStatus {
        self.orchestrator.status(CHART_KEY).await
    }

    /// Re-fetch from the server regardless of the local copy
    pub async fn refresh(&self) -> FetchResult<CacheEntry<Vec<Item>>> {
        self.orchestrator.refresh(CHART_KEY).await
    }
}
