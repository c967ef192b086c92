//! Prometheus metrics for the clustering pipeline.
//!
//! No error in this core is user-visible in real time; operators observe
//! failures through these counters and the structured logs.

use lazy_static::lazy_static;
use prometheus::{CounterVec, IntCounter, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Items processed, labeled by outcome (created, merged, skipped, rejected, failed)
    pub static ref ITEMS_PROCESSED_TOTAL: CounterVec = CounterVec::new(
        Opts::new("items_processed_total", "Total number of items processed")
            .namespace("storycluster"),
        &["outcome"]
    ).expect("Failed to create ITEMS_PROCESSED_TOTAL metric");

    /// Clusters created
    pub static ref CLUSTERS_CREATED_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("clusters_created_total", "Total number of clusters created")
            .namespace("storycluster")
    ).expect("Failed to create CLUSTERS_CREATED_TOTAL metric");

    /// Variants merged into existing clusters
    pub static ref VARIANTS_MERGED_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("variants_merged_total", "Total number of variants merged into existing clusters")
            .namespace("storycluster")
    ).expect("Failed to create VARIANTS_MERGED_TOTAL metric");

    /// Creation races lost (DuplicateEventKey observed and re-matched)
    pub static ref CREATE_CONFLICTS_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("create_conflicts_total", "Total number of cluster-create races lost and re-matched")
            .namespace("storycluster")
    ).expect("Failed to create CREATE_CONFLICTS_TOTAL metric");

    /// Clusters removed by the retention sweeper
    pub static ref CLUSTERS_PURGED_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("clusters_purged_total", "Total number of clusters removed by retention sweeps")
            .namespace("storycluster")
    ).expect("Failed to create CLUSTERS_PURGED_TOTAL metric");

    /// Transient store failures that were retried
    pub static ref STORE_RETRIES_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("store_retries_total", "Total number of retried transient store failures")
            .namespace("storycluster")
    ).expect("Failed to create STORE_RETRIES_TOTAL metric");
}

/// Register all metrics with the global registry.
///
/// Call once at startup; double registration returns an error from
/// prometheus and is reported to the caller.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(ITEMS_PROCESSED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(CLUSTERS_CREATED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(VARIANTS_MERGED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(CREATE_CONFLICTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(CLUSTERS_PURGED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(STORE_RETRIES_TOTAL.clone()))?;
    Ok(())
}

/// Export all metrics in Prometheus text format.
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
