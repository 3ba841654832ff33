//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Cache lookups and invalidations
//! - Upstream fetches and single-flight coalescing
//! - Change bus publishing and collaborator health

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGaugeVec, Opts};

// =============================================================================
// Cache Metrics
// =============================================================================

/// Cache lookups total by result.
pub static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("snowdash_cache_lookups_total", "Total ticket lookups"),
        &["result"], // "hit", "miss", "stale", "not_found", "upstream_error"
    )
    .unwrap()
});

/// Explicit invalidations total.
pub static CACHE_INVALIDATIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "snowdash_cache_invalidations_total",
        "Total explicit cache invalidations",
    )
    .unwrap()
});

// =============================================================================
// Upstream Metrics
// =============================================================================

/// Upstream fetches total by result.
pub static UPSTREAM_FETCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "snowdash_upstream_fetches_total",
            "Total fetches issued to the source of truth",
        ),
        &["result"], // "found", "not_found", "error", "timeout"
    )
    .unwrap()
});

/// Upstream fetch duration in seconds.
pub static UPSTREAM_FETCH_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "snowdash_upstream_fetch_duration_seconds",
            "Duration of source of truth fetches",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    )
    .unwrap()
});

/// Lookups that joined an already in-flight fetch.
pub static SINGLE_FLIGHT_JOINS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "snowdash_single_flight_joins_total",
        "Lookups coalesced onto an in-flight upstream fetch",
    )
    .unwrap()
});

// =============================================================================
// Collaborator Metrics
// =============================================================================

/// Change events published by result.
pub static CHANGE_EVENTS_PUBLISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "snowdash_change_events_published_total",
            "Total change events handed to the change bus",
        ),
        &["result"], // "ok", "error"
    )
    .unwrap()
});

/// Last health probe result per collaborator (1 = up).
pub static COLLABORATOR_UP: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "snowdash_collaborator_up",
            "Whether the last health probe of a collaborator succeeded",
        ),
        &["collaborator"], // "durable_cache", "source_of_truth", "change_bus"
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Cache
        Box::new(CACHE_LOOKUPS.clone()),
        Box::new(CACHE_INVALIDATIONS.clone()),
        // Upstream
        Box::new(UPSTREAM_FETCHES.clone()),
        Box::new(UPSTREAM_FETCH_DURATION.clone()),
        Box::new(SINGLE_FLIGHT_JOINS.clone()),
        // Collaborators
        Box::new(CHANGE_EVENTS_PUBLISHED.clone()),
        Box::new(COLLABORATOR_UP.clone()),
    ]
}
