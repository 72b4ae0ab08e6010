// Configuration Module Tests
// Tests for ServerConfig, loading, defaults, and conversions

use std::fs;
use std::time::Duration;
use trackboard_server::ServerConfig;
use trackboard_server::config::ConfigError;

#[test]
fn test_config_default_values() {
    let config = ServerConfig::default();

    // Server defaults
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 15600);

    // Source defaults
    assert_eq!(config.source.listing_limit, 100);
    assert_eq!(config.source.batch_size, 50);
    assert_eq!(config.source.batch_delay_ms, 100);
    assert_eq!(config.source.track_url_base, "https://open.spotify.com/track/");

    // Cache defaults
    assert_eq!(config.cache.key, "chart:global:daily");
    assert_eq!(config.cache.ttl_hours, 48);
    assert_eq!(config.cache.io_timeout_ms, 5000);
    assert_eq!(config.cache.fetch_timeout_secs, 60);

    // Scheduler defaults
    assert!(config.scheduler.enabled);
    assert_eq!(config.scheduler.interval_secs, 3600);
    assert_eq!(config.scheduler.stale_after_hours, None);

    // Policy and logging defaults
    assert_eq!(config.policy.cutover_hour, 23);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, "json");
}

#[test]
fn test_config_server_addr() {
    let config = ServerConfig::default();
    assert_eq!(config.server_addr(), "0.0.0.0:15600");

    let mut custom_config = ServerConfig::default();
    custom_config.server.host = "127.0.0.1".to_string();
    custom_config.server.port = 8080;
    assert_eq!(custom_config.server_addr(), "127.0.0.1:8080");
}

#[test]
fn test_config_partial_yaml_keeps_defaults() {
    let yaml = r#"
server:
  port: 9000
source:
  batch_size: 500
scheduler:
  stale_after_hours: 12
policy:
  cutover_hour: 6
"#;

    let config = ServerConfig::from_yaml(yaml).unwrap();
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.cache.ttl_hours, 48);

    // Batch size above the catalog limit is clamped
    assert_eq!(config.to_fetcher_config().batch_size, 50);

    let scheduler = config.to_scheduler_config();
    assert_eq!(scheduler.interval, Duration::from_secs(3600));
    assert_eq!(scheduler.stale_after, Some(Duration::from_secs(12 * 3600)));

    let orchestrator = config.to_orchestrator_config();
    assert_eq!(orchestrator.fetch_timeout, Duration::from_secs(60));
    assert_eq!(
        orchestrator.policy,
        trackboard_core::FreshnessPolicy::with_cutover_hour(6)
    );
}

#[test]
fn test_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trackboard.yml");
    fs::write(
        &path,
        r#"
cache:
  directory: /var/lib/trackboard
  io_timeout_ms: 250
logging:
  level: debug
  format: pretty
"#,
    )
    .unwrap();

    let config = ServerConfig::from_file(&path).unwrap();
    assert_eq!(
        config.cache.directory,
        std::path::PathBuf::from("/var/lib/trackboard")
    );
    assert_eq!(config.cache_io_timeout(), Duration::from_millis(250));
    assert_eq!(config.cache_ttl(), Duration::from_secs(48 * 3600));
    assert_eq!(config.logging.format, "pretty");
}

#[test]
fn test_config_missing_file() {
    let err = ServerConfig::from_file("/nonexistent/trackboard.yml").unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_config_invalid_yaml() {
    let err = ServerConfig::from_yaml("server:\n  port: not-a-number").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_listing_and_catalog_configs() {
    let config = ServerConfig::default();
    let secrets = trackboard_server::Secrets {
        api_secret: "api".to_string(),
        catalog_client_id: "id".to_string(),
        catalog_client_secret: "secret".to_string(),
    };

    let listing = config.to_listing_config();
    assert_eq!(listing.limit, 100);
    assert_eq!(listing.timeout, Duration::from_secs(15));

    let catalog = config.to_catalog_config(&secrets);
    assert_eq!(catalog.client_id, "id");
    assert_eq!(catalog.client_secret, "secret");
    assert_eq!(catalog.api_base, "https://api.spotify.com/v1");
}

#[test]
fn test_config_rejects_zero_scheduler_interval() {
    let err = ServerConfig::from_yaml("scheduler:\n  interval_secs: 0").unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidValue {
            field: "scheduler.interval_secs",
            ..
        }
    ));
}

#[test]
fn test_config_rejects_out_of_range_cutover_hour() {
    let err = ServerConfig::from_yaml("policy:\n  cutover_hour: 24").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}

#[test]
fn test_config_huge_hour_values_saturate() {
    let config = ServerConfig::from_yaml(
        "cache:\n  ttl_hours: 18446744073709551615\nscheduler:\n  stale_after_hours: 18446744073709551615",
    )
    .unwrap();

    assert_eq!(config.cache_ttl(), Duration::from_secs(u64::MAX));
    assert_eq!(
        config.to_scheduler_config().stale_after,
        Some(Duration::from_secs(u64::MAX))
    );
}
