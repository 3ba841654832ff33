//! Freshness policy: how long a cached ticket may be trusted.
//!
//! Active high-priority work churns fast and is revalidated often; closed
//! tickets are effectively immutable and are kept for hours. The policy is a
//! pure function of a ticket's `state` and `priority`.

mod config;
mod policy;

pub use config::FreshnessConfig;
pub use policy::{FreshnessDecision, FreshnessPolicy, PriorityClass, RefreshPriority, StateClass};
