//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Runtime settings for the data orchestrator (the `[cache]` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Upper bound on a single source of truth fetch (milliseconds).
    /// Exceeding it counts as the upstream being unavailable.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_ms: u64,

    /// Upper bound on each collaborator health probe (milliseconds).
    #[serde(default = "default_probe_timeout")]
    pub health_probe_timeout_ms: u64,

    /// Upper bound on one change bus publish (milliseconds).
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_ms: u64,

    /// Return an expired cached copy, flagged stale, when a refresh fails.
    #[serde(default)]
    pub serve_stale_on_upstream_error: bool,

    /// How often the server purges expired cache rows (seconds, 0 = never).
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

fn default_fetch_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_probe_timeout() -> u64 {
    2_000 // 2 seconds
}

fn default_publish_timeout() -> u64 {
    1_000 // 1 second
}

fn default_purge_interval() -> u64 {
    300 // 5 minutes
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: default_fetch_timeout(),
            health_probe_timeout_ms: default_probe_timeout(),
            publish_timeout_ms: default_publish_timeout(),
            serve_stale_on_upstream_error: false,
            purge_interval_secs: default_purge_interval(),
        }
    }
}
