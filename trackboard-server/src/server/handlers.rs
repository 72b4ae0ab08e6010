use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use trackboard_core::{CacheStatus, Fetcher, Item, RefreshOrchestrator, RefreshState};

use super::error::ApiError;
use crate::metrics;
use crate::source::ChartFetcher;

/// Reports how a chart response was produced: `cache`, `fresh` or `stale`
pub const CACHE_STATE_HEADER: &str = "x-cache-state";

/// Application state shared across handlers
pub struct AppState<F: Fetcher<Output = Vec<Item>> = ChartFetcher> {
    pub orchestrator: RefreshOrchestrator<F>,
    /// Cache key the chart lives under
    pub key: Arc<str>,
}

impl<F: Fetcher<Output = Vec<Item>>> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
            key: self.key.clone(),
        }
    }
}

impl<F: Fetcher<Output = Vec<Item>>> AppState<F> {
    pub fn new(orchestrator: RefreshOrchestrator<F>, key: impl Into<Arc<str>>) -> Self {
        Self {
            orchestrator,
            key: key.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub cached_at: DateTime<Utc>,
    pub items: Vec<Item>,
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "trackboard",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /api/v1/chart
pub async fn get_chart<F: Fetcher<Output = Vec<Item>>>(
    State(state): State<AppState<F>>,
) -> Result<Response, ApiError> {
    let served = match state.orchestrator.read(&state.key).await {
        Ok(served) => served,
        Err(e) => {
            metrics::record_read(RefreshState::Failed.as_str());
            return Err(e.into());
        }
    };
    metrics::record_read(served.state.as_str());
    debug!(
        "GET chart key={} state={} cached_at={}",
        state.key,
        served.state.as_str(),
        served.cached_at
    );

    Ok((
        [(CACHE_STATE_HEADER, served.state.as_str())],
        Json(served.data),
    )
        .into_response())
}

/// GET /api/v1/chart/status
pub async fn get_status<F: Fetcher<Output = Vec<Item>>>(
    State(state): State<AppState<F>>,
) -> Json<CacheStatus> {
    Json(state.orchestrator.status(&state.key).await)
}

/// POST /api/v1/chart/refresh
pub async fn post_refresh<F: Fetcher<Output = Vec<Item>>>(
    State(state): State<AppState<F>>,
) -> Result<Json<RefreshResponse>, ApiError> {
    info!("Forced refresh requested for key={}", state.key);
    let entry = state.orchestrator.refresh(&state.key).await?;

    Ok(Json(RefreshResponse {
        cached_at: entry.cached_at,
        items: entry.data,
    }))
}
