use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use trackboard_core::{CacheStore, Clock, RefreshOrchestrator, RefreshScheduler, SystemClock};
use trackboard_server::{
    AppState, BearerAuth, CatalogClient, ChartPage, Secrets, ServerConfig, SnapshotBackend,
    SnapshotConfig, SourceFetcher, create_router,
};

#[derive(Parser)]
#[command(name = "trackboard-server")]
#[command(about = "Serves the daily ranked track chart", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_tracing(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("loading config from {:?}", path))?,
        None => ServerConfig::default(),
    };
    init_tracing(&config);

    let secrets = Secrets::from_env().context("reading secrets from the environment")?;

    info!("Starting Trackboard Server v{}", env!("CARGO_PKG_VERSION"));
    trackboard_server::metrics::init_metrics();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let backend = SnapshotBackend::new(
        SnapshotConfig {
            directory: config.cache.directory.clone(),
            ttl: config.cache_ttl(),
        },
        clock.clone(),
    );
    info!("Snapshot cache at {:?}", backend.directory());
    let store =
        CacheStore::new(Arc::new(backend), clock).with_io_timeout(config.cache_io_timeout());

    let listing = ChartPage::new(config.to_listing_config())?;
    let catalog = CatalogClient::new(config.to_catalog_config(&secrets))?;
    let fetcher = SourceFetcher::new(listing, catalog, config.to_fetcher_config());

    let orchestrator = RefreshOrchestrator::new(fetcher, store, config.to_orchestrator_config());

    let scheduler = if config.scheduler.enabled {
        let scheduler = RefreshScheduler::new(
            orchestrator.clone(),
            config.cache.key.clone(),
            config.to_scheduler_config(),
        );
        Some(scheduler.spawn())
    } else {
        warn!("Refresh scheduler disabled; data refreshes on read only");
        None
    };

    let state = AppState::new(orchestrator, config.cache.key.as_str());
    let app = create_router(state, BearerAuth::new(secrets.api_secret.as_str()));

    let addr = config.server_addr();
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    if let Some(handle) = scheduler {
        handle.shutdown().await;
    }

    Ok(())
}
