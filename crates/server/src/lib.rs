pub mod api;
pub mod metrics;
pub mod purge;
pub mod state;
