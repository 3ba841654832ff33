//! Data orchestrator: the read-through ticket cache.
//!
//! Coordinates the durable cache and the source of truth behind one API:
//! - **Reads**: cache first, then a single coalesced upstream fetch per key
//! - **Invalidation**: explicit deletes after known upstream mutations
//! - **Health/stats**: parallel collaborator probes and a running hit ratio

mod config;
mod service;
mod single_flight;
mod types;

pub use config::OrchestratorConfig;
pub use service::DataOrchestrator;
pub use single_flight::SingleFlight;
pub use types::{
    CacheStatsReport, HealthDetails, HealthReport, HealthState, LookupOutcome,
    OrchestratorError, TicketDetails,
};
