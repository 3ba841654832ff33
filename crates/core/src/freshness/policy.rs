use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::FreshnessConfig;
use crate::ticket::TicketRecord;

/// Advisory revalidation urgency attached to a cached ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshPriority {
    Low,
    Medium,
    High,
}

impl RefreshPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parse a stored label; unknown labels read back as `Medium`.
    pub fn parse(label: &str) -> Self {
        match label {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }
}

/// Lifecycle class of a ticket state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    Active,
    Closed,
    Unknown,
}

impl StateClass {
    /// Classify a ServiceNow task state code or label.
    pub fn classify(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "1" | "2" | "3" | "-5" | "new" | "open" | "in progress" | "work in progress"
            | "on hold" | "pending" | "active" => Self::Active,
            "6" | "7" | "8" | "resolved" | "closed" | "closed complete" | "closed incomplete"
            | "canceled" | "cancelled" => Self::Closed,
            _ => Self::Unknown,
        }
    }
}

/// Urgency class of a ticket priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityClass {
    Critical,
    High,
    Medium,
    Low,
    Unknown,
}

impl PriorityClass {
    /// Classify a ServiceNow priority code (`1`..`5`) or label.
    pub fn classify(priority: &str) -> Self {
        let normalized = priority.trim().to_ascii_lowercase();
        // Display values look like "1 - Critical".
        let head = normalized
            .split(" - ")
            .next()
            .unwrap_or(normalized.as_str());

        match head {
            "1" | "critical" | "highest" => Self::Critical,
            "2" | "high" => Self::High,
            "3" | "moderate" | "medium" => Self::Medium,
            "4" | "5" | "low" | "planning" | "lowest" => Self::Low,
            _ => Self::Unknown,
        }
    }
}

/// Cache lifetime and refresh urgency chosen for one ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessDecision {
    pub ttl_ms: u64,
    pub refresh_priority: RefreshPriority,
}

impl FreshnessDecision {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

/// Maps a ticket's state and priority to a [`FreshnessDecision`].
///
/// Total and deterministic: unrecognized input falls back to the short
/// default tier instead of failing.
#[derive(Debug, Clone, Default)]
pub struct FreshnessPolicy {
    config: FreshnessConfig,
}

impl FreshnessPolicy {
    pub fn new(config: FreshnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FreshnessConfig {
        &self.config
    }

    pub fn decide(&self, ticket: &TicketRecord) -> FreshnessDecision {
        self.decide_for(&ticket.state, &ticket.priority)
    }

    pub fn decide_for(&self, state: &str, priority: &str) -> FreshnessDecision {
        let c = &self.config;
        let (ttl_ms, refresh_priority) =
            match (StateClass::classify(state), PriorityClass::classify(priority)) {
                (StateClass::Closed, _) => (c.closed_ttl_ms, RefreshPriority::Low),
                (StateClass::Active, PriorityClass::Critical) => {
                    (c.critical_ttl_ms, RefreshPriority::High)
                }
                (StateClass::Active, PriorityClass::High) => (c.high_ttl_ms, RefreshPriority::High),
                (StateClass::Active, PriorityClass::Medium) => {
                    (c.medium_ttl_ms, RefreshPriority::Medium)
                }
                (StateClass::Active, PriorityClass::Low) => (c.low_ttl_ms, RefreshPriority::Low),
                _ => (c.default_ttl_ms, RefreshPriority::Medium),
            };

        FreshnessDecision {
            ttl_ms,
            refresh_priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::TicketTable;

    fn policy() -> FreshnessPolicy {
        FreshnessPolicy::default()
    }

    #[test]
    fn test_closed_tickets_use_closed_tier_regardless_of_priority() {
        let policy = policy();
        for state in ["6", "7", "8", "Resolved", "closed"] {
            for priority in ["1", "2", "3", "4", "5", "", "bogus"] {
                let decision = policy.decide_for(state, priority);
                assert_eq!(decision.ttl_ms, 3_600_000, "state={} priority={}", state, priority);
                assert_eq!(decision.refresh_priority, RefreshPriority::Low);
            }
        }
    }

    #[test]
    fn test_critical_active_is_high_refresh_priority() {
        let policy = policy();
        for state in ["1", "2", "3", "In Progress", "open"] {
            let decision = policy.decide_for(state, "1");
            assert_eq!(decision.refresh_priority, RefreshPriority::High);
            assert_eq!(decision.ttl_ms, 60_000);
        }
    }

    #[test]
    fn test_priority_one_active_ticket() {
        let ticket = TicketRecord::new("test-123", TicketTable::Incident)
            .with_state("2")
            .with_priority("1");
        assert_eq!(policy().decide(&ticket).ttl_ms, 60_000);
    }

    #[test]
    fn test_state_six_is_closed() {
        let ticket = TicketRecord::new("test-123", TicketTable::Incident)
            .with_state("6")
            .with_priority("3");
        assert_eq!(policy().decide(&ticket).ttl_ms, 3_600_000);
    }

    #[test]
    fn test_medium_active_is_medium_tier() {
        let decision = policy().decide_for("2", "3");
        assert_eq!(decision.ttl_ms, 300_000);
        assert_eq!(decision.refresh_priority, RefreshPriority::Medium);
    }

    #[test]
    fn test_display_value_priority() {
        assert_eq!(PriorityClass::classify("1 - Critical"), PriorityClass::Critical);
        assert_eq!(PriorityClass::classify("4 - Low"), PriorityClass::Low);
    }

    #[test]
    fn test_unrecognized_input_falls_back_to_default() {
        let policy = policy();
        for (state, priority) in [("", ""), ("42", "1"), ("2", "urgent"), ("weird", "weird")] {
            let decision = policy.decide_for(state, priority);
            assert_eq!(decision.ttl_ms, 60_000);
            assert_eq!(decision.refresh_priority, RefreshPriority::Medium);
        }
    }

    #[test]
    fn test_tier_ordering() {
        let policy = policy();
        let critical = policy.decide_for("2", "1").ttl_ms;
        let high = policy.decide_for("2", "2").ttl_ms;
        let medium = policy.decide_for("2", "3").ttl_ms;
        let low = policy.decide_for("2", "4").ttl_ms;
        let closed = policy.decide_for("7", "1").ttl_ms;
        assert!(critical <= high && high <= medium && medium <= low && low <= closed);
    }

    #[test]
    fn test_custom_config_is_used() {
        let policy = FreshnessPolicy::new(FreshnessConfig {
            critical_ttl_ms: 5_000,
            ..Default::default()
        });
        assert_eq!(policy.decide_for("1", "1").ttl(), Duration::from_secs(5));
    }

    #[test]
    fn test_refresh_priority_labels() {
        for priority in [RefreshPriority::Low, RefreshPriority::Medium, RefreshPriority::High] {
            assert_eq!(RefreshPriority::parse(priority.as_str()), priority);
        }
        assert_eq!(RefreshPriority::parse("urgent"), RefreshPriority::Medium);
    }
}
