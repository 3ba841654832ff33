//! Background removal of expired cache rows.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use snowdash_core::SqliteDurableCache;

/// Purge expired rows every `period` until the task is aborted.
pub fn spawn_purge_task(cache: Arc<SqliteDurableCache>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match cache.purge_expired(Utc::now()).await {
                Ok(0) => debug!("Cache purge: nothing expired"),
                Ok(removed) => info!("Cache purge removed {} expired entries", removed),
                Err(e) => warn!("Cache purge failed: {}", e),
            }
        }
    })
}
