//! Mock source of truth for testing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::source::{FetchResult, RecordFilter, SourceError, SourceOfTruth};
use crate::ticket::{TicketKey, TicketRecord, TicketTable};

/// A recorded fetch for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedFetch {
    pub table: TicketTable,
    pub filter: RecordFilter,
    pub timestamp: Instant,
}

/// Mock implementation of the SourceOfTruth trait.
///
/// Provides controllable behavior for testing:
/// - Serve configurable records
/// - Track fetches for assertions
/// - Simulate failures and delays
#[derive(Debug, Default)]
pub struct MockSourceOfTruth {
    records: Arc<RwLock<HashMap<TicketKey, TicketRecord>>>,
    fetches: Arc<RwLock<Vec<RecordedFetch>>>,
    fail: Arc<RwLock<bool>>,
    delay: Arc<RwLock<Option<Duration>>>,
    unhealthy: Arc<RwLock<bool>>,
    health_delay: Arc<RwLock<Option<Duration>>>,
}

impl MockSourceOfTruth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a record.
    pub async fn add_record(&self, record: TicketRecord) {
        self.records.write().await.insert(record.key(), record);
    }

    pub async fn remove_record(&self, sys_id: &str, table: &TicketTable) {
        self.records
            .write()
            .await
            .remove(&TicketKey::new(sys_id, table.clone()));
    }

    pub async fn fetch_count(&self) -> usize {
        self.fetches.read().await.len()
    }

    pub async fn recorded_fetches(&self) -> Vec<RecordedFetch> {
        self.fetches.read().await.clone()
    }

    /// Make every fetch fail with an API error.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    /// Delay every fetch by `delay` before answering.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub async fn set_healthy(&self, healthy: bool) {
        *self.unhealthy.write().await = !healthy;
    }

    /// Make health checks hang for `delay` before answering.
    pub async fn set_health_delay(&self, delay: Duration) {
        *self.health_delay.write().await = Some(delay);
    }
}

#[async_trait]
impl SourceOfTruth for MockSourceOfTruth {
    async fn fetch_full_record(
        &self,
        table: &TicketTable,
        filter: &RecordFilter,
    ) -> Result<FetchResult, SourceError> {
        self.fetches.write().await.push(RecordedFetch {
            table: table.clone(),
            filter: filter.clone(),
            timestamp: Instant::now(),
        });

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.fail.read().await {
            return Err(SourceError::Api {
                status: 503,
                message: "mock upstream failure".to_string(),
            });
        }

        let records = self.records.read().await;
        let result = records
            .values()
            .filter(|r| &r.table == table)
            .filter(|r| filter.sys_id.as_ref().is_none_or(|id| &r.sys_id == id))
            .take(filter.limit.map(|l| l as usize).unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok(FetchResult { result })
    }

    async fn get_health_status(&self) -> Result<(), SourceError> {
        let delay = *self.health_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.unhealthy.read().await {
            return Err(SourceError::Unavailable("mock upstream down".to_string()));
        }
        Ok(())
    }
}
