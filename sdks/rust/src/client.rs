//! Trackboard client implementation

use crate::error::{Result, TrackboardError};
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use trackboard_core::{CacheStatus, Item};
use url::Url;

/// Header carrying how the server produced a chart response
pub const CACHE_STATE_HEADER: &str = "x-cache-state";

/// Trackboard client configuration
#[derive(Debug, Clone)]
pub struct TrackboardConfig {
    /// Base URL of the Trackboard server
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Bearer token for the chart routes
    pub auth_token: Option<String>,
}

impl TrackboardConfig {
    /// Create a new configuration with the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            auth_token: None,
        }
    }

    /// Set the timeout for requests
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the authentication token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

/// Chart as returned by the server
#[derive(Debug, Clone)]
pub struct Chart {
    pub items: Vec<Item>,
    /// `cache`, `fresh` or `stale`, when the server reported it
    pub cache_state: Option<String>,
}

/// Result of a forced refresh
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResult {
    pub cached_at: DateTime<Utc>,
    pub items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Main Trackboard client
#[derive(Clone)]
pub struct TrackboardClient {
    config: Arc<TrackboardConfig>,
    http_client: Client,
    base_url: Url,
}

impl TrackboardClient {
    /// Create a new Trackboard client
    pub fn new(config: TrackboardConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;

        let mut http_client_builder = Client::builder().timeout(config.timeout);

        if let Some(ref token) = config.auth_token {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", token).parse()?,
            );
            http_client_builder = http_client_builder.default_headers(headers);
        }

        let http_client = http_client_builder.build()?;

        Ok(Self {
            config: Arc::new(config),
            http_client,
            base_url,
        })
    }

    pub fn config(&self) -> &TrackboardConfig {
        &self.config
    }

    /// Fetch the current chart, in rank order
    pub async fn chart(&self) -> Result<Chart> {
        let url = self.base_url.join("api/v1/chart")?;
        let response = check(self.http_client.get(url).send().await?).await?;

        let cache_state = response
            .headers()
            .get(CACHE_STATE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let items: Vec<Item> = response.json().await?;

        debug!("Fetched chart: {} items ({:?})", items.len(), cache_state);
        Ok(Chart { items, cache_state })
    }

    /// How the server classifies its cached chart. Never triggers a refresh.
    pub async fn status(&self) -> Result<CacheStatus> {
        let url = self.base_url.join("api/v1/chart/status")?;
        let response = check(self.http_client.get(url).send().await?).await?;
        Ok(response.json().await?)
    }

    /// Force the server to rebuild the chart now
    pub async fn refresh(&self) -> Result<RefreshResult> {
        let url = self.base_url.join("api/v1/chart/refresh")?;
        let response = check(self.http_client.post(url).send().await?).await?;
        Ok(response.json().await?)
    }
}

/// Map non-success responses to SDK errors using the server's `{error, code}` body
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);

    Err(match status {
        StatusCode::UNAUTHORIZED => TrackboardError::Unauthorized(message),
        StatusCode::SERVICE_UNAVAILABLE => TrackboardError::Unavailable(message),
        _ => TrackboardError::ServerError {
            status: status.as_u16(),
            message,
        },
    })
}
