//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the snowdash server:
//! - HTTP request metrics (latency, counts)
//! - Cache population and hit ratio (collected dynamically)
//! - Change bus subscribers (collected dynamically)
//!
//! Lookup, fetch and publish counters live in `snowdash_core::metrics` and are
//! registered here so one scrape covers both crates.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tracing::warn;

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "snowdash_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("snowdash_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "snowdash_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Cache Metrics (collected dynamically)
// =============================================================================

/// Documents held by the durable cache.
pub static CACHE_DOCUMENTS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "snowdash_cache_documents",
        "Number of documents in the durable cache",
    )
    .unwrap()
});

/// Fresh hits over all lookups since startup.
pub static CACHE_HIT_RATIO: Lazy<Gauge> = Lazy::new(|| {
    Gauge::new(
        "snowdash_cache_hit_ratio",
        "Fraction of lookups served fresh from the durable cache",
    )
    .unwrap()
});

/// Upstream fetches currently outstanding.
pub static UPSTREAM_FETCHES_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "snowdash_upstream_fetches_in_flight",
        "Number of upstream fetches currently outstanding",
    )
    .unwrap()
});

// =============================================================================
// Change Bus Metrics (collected dynamically)
// =============================================================================

/// Live change bus subscribers.
pub static CHANGE_BUS_SUBSCRIBERS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "snowdash_change_bus_subscribers",
        "Number of live change bus subscribers",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Cache
    registry
        .register(Box::new(CACHE_DOCUMENTS.clone()))
        .unwrap();
    registry
        .register(Box::new(CACHE_HIT_RATIO.clone()))
        .unwrap();
    registry
        .register(Box::new(UPSTREAM_FETCHES_IN_FLIGHT.clone()))
        .unwrap();

    // Change bus
    registry
        .register(Box::new(CHANGE_BUS_SUBSCRIBERS.clone()))
        .unwrap();

    // Core metrics (lookups, upstream fetches, change events)
    for metric in snowdash_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the gauges reflect the cache and bus at scrape time.
pub async fn collect_dynamic_metrics(state: &AppState) {
    match state.orchestrator().get_cache_stats().await {
        Ok(stats) => {
            CACHE_DOCUMENTS.set(stats.durable_documents as i64);
            CACHE_HIT_RATIO.set(stats.cache_hit_ratio);
            UPSTREAM_FETCHES_IN_FLIGHT.set(stats.in_flight as i64);
        }
        Err(e) => warn!("Skipping cache gauges: {}", e),
    }

    let subscribers = state
        .change_bus()
        .map(|bus| bus.subscriber_count())
        .unwrap_or(0);
    CHANGE_BUS_SUBSCRIBERS.set(subscribers as i64);
}
