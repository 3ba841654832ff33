//! Freshness tier configuration.

use serde::{Deserialize, Serialize};

/// TTLs for each freshness tier, in milliseconds.
///
/// The values are tunable but their ordering is not: validation rejects a
/// table where an active critical ticket outlives a closed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessConfig {
    /// Closed, resolved or canceled tickets.
    #[serde(default = "default_closed_ttl")]
    pub closed_ttl_ms: u64,

    /// Active tickets with critical priority.
    #[serde(default = "default_critical_ttl")]
    pub critical_ttl_ms: u64,

    /// Active tickets with high priority.
    #[serde(default = "default_high_ttl")]
    pub high_ttl_ms: u64,

    /// Active tickets with moderate priority.
    #[serde(default = "default_medium_ttl")]
    pub medium_ttl_ms: u64,

    /// Active tickets with low or planning priority.
    #[serde(default = "default_low_ttl")]
    pub low_ttl_ms: u64,

    /// Anything the policy does not recognize.
    #[serde(default = "default_fallback_ttl")]
    pub default_ttl_ms: u64,
}

fn default_closed_ttl() -> u64 {
    3_600_000 // 1 hour
}

fn default_critical_ttl() -> u64 {
    60_000 // 1 minute
}

fn default_high_ttl() -> u64 {
    120_000 // 2 minutes
}

fn default_medium_ttl() -> u64 {
    300_000 // 5 minutes
}

fn default_low_ttl() -> u64 {
    900_000 // 15 minutes
}

fn default_fallback_ttl() -> u64 {
    60_000
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            closed_ttl_ms: default_closed_ttl(),
            critical_ttl_ms: default_critical_ttl(),
            high_ttl_ms: default_high_ttl(),
            medium_ttl_ms: default_medium_ttl(),
            low_ttl_ms: default_low_ttl(),
            default_ttl_ms: default_fallback_ttl(),
        }
    }
}

impl FreshnessConfig {
    /// Describe the first ordering violation, if any.
    pub fn ordering_violation(&self) -> Option<String> {
        let tiers = [
            ("critical_ttl_ms", self.critical_ttl_ms),
            ("high_ttl_ms", self.high_ttl_ms),
            ("medium_ttl_ms", self.medium_ttl_ms),
            ("low_ttl_ms", self.low_ttl_ms),
            ("closed_ttl_ms", self.closed_ttl_ms),
        ];

        for pair in tiers.windows(2) {
            let (shorter_name, shorter) = pair[0];
            let (longer_name, longer) = pair[1];
            if shorter > longer {
                return Some(format!(
                    "freshness.{} ({}) must not exceed freshness.{} ({})",
                    shorter_name, shorter, longer_name, longer
                ));
            }
        }

        if self.default_ttl_ms > self.medium_ttl_ms {
            return Some(format!(
                "freshness.default_ttl_ms ({}) must not exceed freshness.medium_ttl_ms ({})",
                self.default_ttl_ms, self.medium_ttl_ms
            ));
        }

        None
    }

    /// Name of the first tier configured with a zero TTL, if any.
    pub fn zero_tier(&self) -> Option<&'static str> {
        [
            ("closed_ttl_ms", self.closed_ttl_ms),
            ("critical_ttl_ms", self.critical_ttl_ms),
            ("high_ttl_ms", self.high_ttl_ms),
            ("medium_ttl_ms", self.medium_ttl_ms),
            ("low_ttl_ms", self.low_ttl_ms),
            ("default_ttl_ms", self.default_ttl_ms),
        ]
        .into_iter()
        .find(|(_, ttl)| *ttl == 0)
        .map(|(name, _)| name)
    }
}
