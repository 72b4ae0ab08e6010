//! Catalog enrichment client.
//!
//! Authenticates with the OAuth2 client-credentials grant and looks up
//! artists and artwork for a batch of track identifiers in one request.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use trackboard_core::{Contributor, Image};

use super::types::{Enrichment, EnrichmentError, EnrichmentSource};

/// Refresh the token this long before the catalog says it expires
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// e.g. `https://api.spotify.com/v1`
    pub api_base: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct TracksResponse {
    #[serde(default)]
    tracks: Vec<Option<CatalogTrack>>,
}

#[derive(Debug, Deserialize)]
struct CatalogTrack {
    id: String,
    #[serde(default)]
    artists: Vec<CatalogArtist>,
    #[serde(default)]
    album: Option<CatalogAlbum>,
}

#[derive(Debug, Deserialize)]
struct CatalogArtist {
    name: String,
    #[serde(default)]
    external_urls: ExternalUrls,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    #[serde(default)]
    spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogAlbum {
    #[serde(default)]
    images: Vec<CatalogImage>,
}

#[derive(Debug, Deserialize)]
struct CatalogImage {
    url: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

impl From<CatalogTrack> for Enrichment {
    fn from(track: CatalogTrack) -> Self {
        Self {
            contributors: track
                .artists
                .into_iter()
                .map(|artist| Contributor {
                    name: artist.name,
                    link: artist.external_urls.spotify.unwrap_or_default(),
                })
                .collect(),
            images: track
                .album
                .map(|album| album.images)
                .unwrap_or_default()
                .into_iter()
                .map(|image| Image {
                    url: image.url,
                    width: image.width.unwrap_or(0),
                    height: image.height.unwrap_or(0),
                })
                .collect(),
        }
    }
}

/// HTTP client for the catalog API
pub struct CatalogClient {
    client: Client,
    config: CatalogConfig,
    token: Mutex<Option<CachedToken>>,
}

impl CatalogClient {
    pub fn new(config: CatalogConfig) -> Result<Self, EnrichmentError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            token: Mutex::new(None),
        })
    }

    /// Current bearer token, requesting a new one when missing or near expiry
    async fn access_token(&self) -> Result<String, EnrichmentError> {
        let cached = self.token.lock().clone();
        if let Some(token) = cached.filter(|token| Instant::now() < token.expires_at) {
            return Ok(token.value);
        }

        debug!("Requesting catalog access token");
        let response = self
            .client
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichmentError::Token(format!(
                "token endpoint returned status {}",
                status.as_u16()
            )));
        }

        let body: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *self.token.lock() = Some(CachedToken {
            value: body.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(body.access_token)
    }
}

#[async_trait]
impl EnrichmentSource for CatalogClient {
    async fn lookup(&self, ids: &[String]) -> Result<HashMap<String, Enrichment>, EnrichmentError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let token = self.access_token().await?;
        let url = format!("{}/tracks", self.config.api_base.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("ids", ids.join(","))])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                self.token.lock().take();
            }
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichmentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: TracksResponse = response.json().await?;
        let found: HashMap<String, Enrichment> = body
            .tracks
            .into_iter()
            .flatten()
            .map(|track| (track.id.clone(), Enrichment::from(track)))
            .collect();

        debug!("Catalog resolved {}/{} tracks", found.len(), ids.len());
        Ok(found)
    }
}
