//! Ticket projection and cache key types.

mod types;

pub use types::{CacheMetadata, CachedTicket, RecordSource, TicketKey, TicketRecord, TicketTable};
