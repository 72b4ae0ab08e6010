//! Prometheus metrics for the chart pipeline
//!
//! - Chart reads by how they were served
//! - Source fetches by outcome, with latency
//! - Enrichment batches skipped after a catalog failure

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, TextEncoder, register_histogram_vec,
    register_int_counter, register_int_counter_vec,
};

lazy_static! {
    /// Chart reads by served state (cache, fresh, stale, failed)
    pub static ref CHART_READS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "trackboard_chart_reads_total",
        "Total number of chart reads by served state",
        &["state"]
    ).unwrap();

    /// Listing plus enrichment runs by outcome (success, error)
    pub static ref FETCHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "trackboard_fetches_total",
        "Total number of source fetches by outcome",
        &["status"]
    ).unwrap();

    /// Source fetch latency in seconds
    pub static ref FETCH_DURATION: HistogramVec = register_histogram_vec!(
        "trackboard_fetch_duration_seconds",
        "Source fetch latency in seconds",
        &["status"],
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();

    /// Enrichment batches dropped because the catalog lookup failed
    pub static ref ENRICHMENT_BATCH_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "trackboard_enrichment_batch_failures_total",
        "Total number of enrichment batches skipped after a catalog failure"
    ).unwrap();
}

/// Render every registered metric in the Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Register all metrics so they show up before their first sample
pub fn init_metrics() {
    let _ = &*CHART_READS_TOTAL;
    let _ = &*FETCHES_TOTAL;
    let _ = &*FETCH_DURATION;
    let _ = &*ENRICHMENT_BATCH_FAILURES_TOTAL;

    tracing::info!("Prometheus metrics initialized");
}

/// Record a chart read
pub fn record_read(state: &str) {
    CHART_READS_TOTAL.with_label_values(&[state]).inc();
}

/// Record a source fetch
pub fn record_fetch(status: &str, duration_secs: f64) {
    FETCHES_TOTAL.with_label_values(&[status]).inc();
    FETCH_DURATION
        .with_label_values(&[status])
        .observe(duration_secs);
}

/// Record a skipped enrichment batch
pub fn record_batch_failure() {
    ENRICHMENT_BATCH_FAILURES_TOTAL.inc();
}
