//! Durable ticket cache.
//!
//! The durable cache is the persistent secondary store consulted before the
//! source of truth. Entries are keyed by `(sys_id, table)` and always carry
//! their cache metadata; writes are upserts, so concurrent refreshes of the
//! same key resolve as last-writer-wins.

mod sqlite;

pub use sqlite::SqliteDurableCache;

use async_trait::async_trait;
use thiserror::Error;

use crate::ticket::{CachedTicket, TicketTable};

/// Errors raised by durable cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backend could not be reached or is not accepting work.
    #[error("Durable cache unavailable: {0}")]
    Unavailable(String),

    /// Query failed inside the backend.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored document could not be decoded.
    #[error("Corrupt cache document for {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Persistent key/value store for cached tickets.
#[async_trait]
pub trait DurableCache: Send + Sync {
    /// Look up a cached ticket. Expired entries are returned as stored; the
    /// caller decides what to do with them.
    async fn find_by_key(
        &self,
        sys_id: &str,
        table: &TicketTable,
    ) -> Result<Option<CachedTicket>, CacheError>;

    /// Insert or overwrite the entry for the ticket's key.
    ///
    /// Returns the version now stored (1 for a new entry).
    async fn upsert(&self, ticket: &CachedTicket) -> Result<u64, CacheError>;

    /// Remove the entry for a key. Deleting a missing key is not an error.
    async fn delete(&self, table: &TicketTable, sys_id: &str) -> Result<(), CacheError>;

    /// Probe backend reachability.
    async fn health_check(&self) -> Result<(), CacheError>;

    /// Number of cached documents, expired ones included.
    async fn count_documents(&self) -> Result<u64, CacheError>;
}
