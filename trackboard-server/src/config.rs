use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use trackboard_core::{CHART_KEY, FreshnessPolicy, OrchestratorConfig, SchedulerConfig};

use crate::source::{CatalogConfig, FetcherConfig, ListingConfig};

/// Env var holding the bearer secret for the read surface
pub const API_SECRET_ENV: &str = "TRACKBOARD_API_SECRET";
/// Env var holding the catalog OAuth client id
pub const CATALOG_CLIENT_ID_ENV: &str = "TRACKBOARD_CATALOG_CLIENT_ID";
/// Env var holding the catalog OAuth client secret
pub const CATALOG_CLIENT_SECRET_ENV: &str = "TRACKBOARD_CATALOG_CLIENT_SECRET";

/// Startup configuration failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required secret: {0}")]
    MissingSecret(&'static str),

    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
}

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: Server,
    pub source: SourceConfig,
    pub cache: CacheConfig,
    pub scheduler: SchedulerSettings,
    pub policy: PolicyConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub listing_url: String,
    pub listing_limit: usize,
    pub catalog_api_base: String,
    pub catalog_token_url: String,
    pub track_url_base: String,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub directory: PathBuf,
    pub key: String,
    pub ttl_hours: u64,
    pub io_timeout_ms: u64,
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub enabled: bool,
    pub interval_secs: u64,
    pub stale_after_hours: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub cutover_hour: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 15600,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            listing_url: "https://kworb.net/spotify/country/global_daily.html".to_string(),
            listing_limit: 100,
            catalog_api_base: "https://api.spotify.com/v1".to_string(),
            catalog_token_url: "https://accounts.spotify.com/api/token".to_string(),
            track_url_base: "https://open.spotify.com/track/".to_string(),
            batch_size: 50,
            batch_delay_ms: 100,
            request_timeout_secs: 15,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./data/cache"),
            key: CHART_KEY.to_string(),
            ttl_hours: 48,
            io_timeout_ms: 5_000,
            fetch_timeout_secs: 60,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
            stale_after_hours: None,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            cutover_hour: trackboard_core::freshness::DEFAULT_CUTOVER_HOUR,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: Server::default(),
            source: SourceConfig::default(),
            cache: CacheConfig::default(),
            scheduler: SchedulerSettings::default(),
            policy: PolicyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML document; omitted sections take defaults
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.interval_secs",
                reason: "must be at least 1",
            });
        }
        if self.policy.cutover_hour > 23 {
            return Err(ConfigError::InvalidValue {
                field: "policy.cutover_hour",
                reason: "must be between 0 and 23",
            });
        }
        Ok(())
    }

    /// Get server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn policy(&self) -> FreshnessPolicy {
        FreshnessPolicy::with_cutover_hour(self.policy.cutover_hour)
    }

    pub fn to_orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_policy(self.policy())
            .with_fetch_timeout(Duration::from_secs(self.cache.fetch_timeout_secs))
    }

    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(self.scheduler.interval_secs),
            stale_after: self
                .scheduler
                .stale_after_hours
                .map(|hours| Duration::from_secs(hours.saturating_mul(3600))),
        }
    }

    pub fn to_listing_config(&self) -> ListingConfig {
        ListingConfig {
            url: self.source.listing_url.clone(),
            limit: self.source.listing_limit,
            timeout: Duration::from_secs(self.source.request_timeout_secs),
        }
    }

    pub fn to_fetcher_config(&self) -> FetcherConfig {
        FetcherConfig::default()
            .with_batch_size(self.source.batch_size)
            .with_batch_delay(Duration::from_millis(self.source.batch_delay_ms))
            .with_track_url_base(self.source.track_url_base.clone())
    }

    pub fn to_catalog_config(&self, secrets: &Secrets) -> CatalogConfig {
        CatalogConfig {
            api_base: self.source.catalog_api_base.clone(),
            token_url: self.source.catalog_token_url.clone(),
            client_id: secrets.catalog_client_id.clone(),
            client_secret: secrets.catalog_client_secret.clone(),
            timeout: Duration::from_secs(self.source.request_timeout_secs),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_hours.saturating_mul(3600))
    }

    pub fn cache_io_timeout(&self) -> Duration {
        Duration::from_millis(self.cache.io_timeout_ms)
    }
}

/// Credentials that only ever come from the environment
#[derive(Clone)]
pub struct Secrets {
    pub api_secret: String,
    pub catalog_client_id: String,
    pub catalog_client_secret: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets").finish_non_exhaustive()
    }
}

impl Secrets {
    /// Read all secrets from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read all secrets through `lookup`; missing or blank values are errors
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let require = |name: &'static str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingSecret(name))
        };

        Ok(Self {
            api_secret: require(API_SECRET_ENV)?,
            catalog_client_id: require(CATALOG_CLIENT_ID_ENV)?,
            catalog_client_secret: require(CATALOG_CLIENT_SECRET_ENV)?,
        })
    }
}
