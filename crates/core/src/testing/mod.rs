//! Testing utilities and mock implementations of the collaborator traits.
//!
//! # Example
//!
//! ```rust,ignore
//! use snowdash_core::testing::{fixtures, MockChangeBus, MockDurableCache, MockSourceOfTruth};
//!
//! let cache = Arc::new(MockDurableCache::new());
//! let source = Arc::new(MockSourceOfTruth::new());
//! source.add_record(fixtures::incident("test-123")).await;
//!
//! let orchestrator = DataOrchestrator::new(cache.clone(), source.clone(), None, ..);
//! orchestrator.get_ticket_details("test-123", &TicketTable::Incident).await?;
//! assert_eq!(source.fetch_count().await, 1);
//! ```

mod mock_bus;
mod mock_cache;
mod mock_source;

pub use mock_bus::MockChangeBus;
pub use mock_cache::MockDurableCache;
pub use mock_source::{MockSourceOfTruth, RecordedFetch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{Duration, Utc};

    use crate::freshness::FreshnessPolicy;
    use crate::ticket::{CachedTicket, TicketRecord, TicketTable};

    /// An active, moderate-priority incident.
    pub fn incident(sys_id: &str) -> TicketRecord {
        TicketRecord::new(sys_id, TicketTable::Incident)
            .with_number("INC001")
            .with_state("2")
            .with_priority("3")
            .with_short_description("Email is down")
    }

    /// An active critical incident.
    pub fn critical_incident(sys_id: &str) -> TicketRecord {
        incident(sys_id).with_priority("1")
    }

    /// A closed change task.
    pub fn closed_change_task(sys_id: &str) -> TicketRecord {
        TicketRecord::new(sys_id, TicketTable::ChangeTask)
            .with_number("CTASK001")
            .with_state("7")
            .with_priority("4")
    }

    /// Wrap a record as freshly cached under the default policy.
    pub fn cached(record: TicketRecord) -> CachedTicket {
        let decision = FreshnessPolicy::default().decide(&record);
        CachedTicket::new(record, &decision, Utc::now())
    }

    /// Wrap a record as a cache entry that expired an hour ago.
    pub fn expired(record: TicketRecord) -> CachedTicket {
        let mut ticket = cached(record);
        ticket.metadata.cached_at = Utc::now() - Duration::hours(2);
        ticket.metadata.expires_at = Utc::now() - Duration::hours(1);
        ticket
    }
}
