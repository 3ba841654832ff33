//! Mock durable cache for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::{CacheError, DurableCache};
use crate::ticket::{CachedTicket, TicketKey, TicketTable};

/// In-memory implementation of the DurableCache trait.
///
/// Provides controllable behavior for testing:
/// - Seed entries directly with [`MockDurableCache::insert`]
/// - Track upserts and deletes for assertions
/// - Simulate read, write and health failures
/// - Simulate read latency that varies between calls
#[derive(Debug, Default)]
pub struct MockDurableCache {
    entries: Arc<RwLock<HashMap<TicketKey, CachedTicket>>>,
    upserts: Arc<RwLock<Vec<CachedTicket>>>,
    deleted: Arc<RwLock<Vec<(TicketTable, String)>>>,
    fail_reads: Arc<RwLock<bool>>,
    fail_writes: Arc<RwLock<bool>>,
    unhealthy: Arc<RwLock<bool>>,
    health_delay: Arc<RwLock<Option<Duration>>>,
    read_stagger: Arc<RwLock<Option<(Duration, u32)>>>,
    reads: Arc<AtomicU32>,
}

impl MockDurableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry without recording an upsert.
    pub async fn insert(&self, ticket: CachedTicket) {
        self.entries.write().await.insert(ticket.key(), ticket);
    }

    pub async fn get(&self, key: &TicketKey) -> Option<CachedTicket> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn upserts(&self) -> Vec<CachedTicket> {
        self.upserts.read().await.clone()
    }

    /// Deletes in call order, as `(table, sys_id)`.
    pub async fn deleted(&self) -> Vec<(TicketTable, String)> {
        self.deleted.read().await.clone()
    }

    pub async fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.write().await = fail;
    }

    pub async fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write().await = fail;
    }

    pub async fn set_healthy(&self, healthy: bool) {
        *self.unhealthy.write().await = !healthy;
    }

    /// Make health checks hang for `delay` before answering.
    pub async fn set_health_delay(&self, delay: Duration) {
        *self.health_delay.write().await = Some(delay);
    }

    /// Delay the n-th read's answer by `step * (n % cycle)`.
    ///
    /// The entry is looked up before the delay, so a slow read can return a
    /// snapshot that a concurrent write has already superseded.
    pub async fn set_read_stagger(&self, step: Duration, cycle: u32) {
        *self.read_stagger.write().await = Some((step, cycle.max(1)));
    }
}

#[async_trait]
impl DurableCache for MockDurableCache {
    async fn find_by_key(
        &self,
        sys_id: &str,
        table: &TicketTable,
    ) -> Result<Option<CachedTicket>, CacheError> {
        if *self.fail_reads.read().await {
            return Err(CacheError::Unavailable("mock read failure".to_string()));
        }
        let key = TicketKey::new(sys_id, table.clone());
        let found = self.entries.read().await.get(&key).cloned();

        let stagger = *self.read_stagger.read().await;
        if let Some((step, cycle)) = stagger {
            let n = self.reads.fetch_add(1, Ordering::SeqCst) % cycle;
            tokio::time::sleep(step * n).await;
        }

        Ok(found)
    }

    async fn upsert(&self, ticket: &CachedTicket) -> Result<u64, CacheError> {
        if *self.fail_writes.read().await {
            return Err(CacheError::Unavailable("mock write failure".to_string()));
        }

        let mut entries = self.entries.write().await;
        let version = entries
            .get(&ticket.key())
            .map(|existing| existing.metadata.version + 1)
            .unwrap_or(1);

        let mut stored = ticket.clone();
        stored.metadata.version = version;
        entries.insert(stored.key(), stored.clone());
        self.upserts.write().await.push(stored);

        Ok(version)
    }

    async fn delete(&self, table: &TicketTable, sys_id: &str) -> Result<(), CacheError> {
        if *self.fail_writes.read().await {
            return Err(CacheError::Unavailable("mock write failure".to_string()));
        }

        self.deleted
            .write()
            .await
            .push((table.clone(), sys_id.to_string()));
        self.entries
            .write()
            .await
            .remove(&TicketKey::new(sys_id, table.clone()));
        Ok(())
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        let delay = *self.health_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.unhealthy.read().await {
            return Err(CacheError::Unavailable("mock cache down".to_string()));
        }
        Ok(())
    }

    async fn count_documents(&self) -> Result<u64, CacheError> {
        if *self.fail_reads.read().await {
            return Err(CacheError::Unavailable("mock read failure".to_string()));
        }
        Ok(self.entries.read().await.len() as u64)
    }
}
