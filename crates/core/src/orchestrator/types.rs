//! Types for the data orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ticket::{CacheMetadata, CachedTicket, RecordSource, TicketRecord};

/// Errors surfaced by the orchestrator.
///
/// `Clone` so every caller sharing one in-flight fetch receives the same failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// The source of truth failed or timed out and no usable cached copy exists.
    #[error("source of truth unavailable for {key}: {reason}")]
    UpstreamUnavailable { key: String, reason: String },

    /// The durable cache could not complete an operation that requires it.
    #[error("durable cache unavailable: {reason}")]
    CacheUnavailable { reason: String },
}

/// A ticket returned to callers, with its cache metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketDetails {
    pub record: TicketRecord,
    pub metadata: CacheMetadata,
    pub source: RecordSource,
    /// Expired copy returned because a refresh failed.
    #[serde(default)]
    pub stale: bool,
    /// Whether this copy is stored in the durable cache.
    pub persisted: bool,
}

impl TicketDetails {
    pub(crate) fn from_cache(ticket: CachedTicket, stale: bool) -> Self {
        Self {
            record: ticket.record,
            metadata: ticket.metadata,
            source: RecordSource::DurableCache,
            stale,
            persisted: true,
        }
    }

    pub(crate) fn from_source(ticket: CachedTicket, persisted: bool) -> Self {
        Self {
            record: ticket.record,
            metadata: ticket.metadata,
            source: RecordSource::SourceOfTruth,
            stale: false,
            persisted,
        }
    }
}

/// Tagged result of a single lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// Fresh copy served from the durable cache.
    Hit(TicketDetails),
    /// Fetched from the source of truth.
    Miss(TicketDetails),
    /// Refresh failed; expired copy served instead.
    Stale {
        details: TicketDetails,
        error: OrchestratorError,
    },
    /// The source of truth has no such ticket.
    NotFound,
    /// Refresh failed with nothing to fall back on.
    UpstreamError(OrchestratorError),
}

impl LookupOutcome {
    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Hit(_) => "hit",
            Self::Miss(_) => "miss",
            Self::Stale { .. } => "stale",
            Self::NotFound => "not_found",
            Self::UpstreamError(_) => "upstream_error",
        }
    }

    /// Collapse into the caller-facing result.
    pub fn into_result(self) -> Result<Option<TicketDetails>, OrchestratorError> {
        match self {
            Self::Hit(details) | Self::Miss(details) | Self::Stale { details, .. } => {
                Ok(Some(details))
            }
            Self::NotFound => Ok(None),
            Self::UpstreamError(err) => Err(err),
        }
    }
}

/// Overall health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Per-collaborator probe results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthDetails {
    pub durable_cache: bool,
    pub source_of_truth: bool,
    /// `false` when no change bus is configured.
    pub change_bus: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthState,
    pub details: HealthDetails,
}

impl HealthReport {
    /// Classify probe results. The change bus is advisory: its failure alone
    /// degrades, and an unconfigured bus does not count against health.
    pub fn from_probes(durable_cache: bool, source_of_truth: bool, change_bus: Option<bool>) -> Self {
        let status = if !durable_cache || !source_of_truth {
            HealthState::Unhealthy
        } else if change_bus == Some(false) {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        };

        Self {
            status,
            details: HealthDetails {
                durable_cache,
                source_of_truth,
                change_bus: change_bus.unwrap_or(false),
            },
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatsReport {
    /// Documents currently held by the durable cache, expired ones included.
    pub durable_documents: u64,
    /// `hits / (hits + misses)`; 0.0 before the first lookup.
    pub cache_hit_ratio: f64,
    pub hits: u64,
    pub misses: u64,
    /// Upstream fetches currently outstanding.
    pub in_flight: usize,
}

pub(crate) fn hit_ratio(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
