//! SQLite-backed durable cache implementation.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{CacheError, DurableCache};
use crate::freshness::RefreshPriority;
use crate::ticket::{CacheMetadata, CachedTicket, TicketRecord, TicketTable};

/// SQLite-backed durable cache.
///
/// Blocking rusqlite calls run on the tokio blocking pool so cache lookups
/// never stall the async workers.
#[derive(Clone)]
pub struct SqliteDurableCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDurableCache {
    /// Open (or create) the cache database at `path`.
    pub fn new(path: &Path) -> Result<Self, CacheError> {
        let conn = Connection::open(path).map_err(|e| CacheError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory() -> Result<Self, CacheError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CacheError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CacheError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS ticket_cache (
                sys_id TEXT NOT NULL,
                ticket_table TEXT NOT NULL,
                document TEXT NOT NULL,
                cached_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                refresh_priority TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                checksum TEXT NOT NULL,
                PRIMARY KEY (sys_id, ticket_table)
            );

            CREATE INDEX IF NOT EXISTS idx_ticket_cache_expires_at ON ticket_cache(expires_at);
            CREATE INDEX IF NOT EXISTS idx_ticket_cache_priority ON ticket_cache(refresh_priority);
            "#,
        )
        .map_err(|e| CacheError::Database(e.to_string()))?;

        Ok(())
    }

    /// Delete every entry whose `expires_at` is at or before `now`.
    ///
    /// Returns the number of rows removed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, CacheError> {
        let cutoff = format_timestamp(now);
        self.with_conn(move |conn| {
            let removed = conn
                .execute(
                    "DELETE FROM ticket_cache WHERE expires_at <= ?",
                    params![cutoff],
                )
                .map_err(|e| CacheError::Database(e.to_string()))?;
            Ok(removed as u64)
        })
        .await
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T, CacheError>
    where
        F: FnOnce(&Connection) -> Result<T, CacheError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| CacheError::Unavailable("connection lock poisoned".to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| CacheError::Unavailable(e.to_string()))?
    }

    fn row_to_cached(
        row: &rusqlite::Row,
    ) -> rusqlite::Result<(String, String, String, String, String, i64)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(key: &str, value: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::Corrupt {
            key: key.to_string(),
            reason: format!("invalid timestamp '{}': {}", value, e),
        })
}

#[async_trait]
impl DurableCache for SqliteDurableCache {
    async fn find_by_key(
        &self,
        sys_id: &str,
        table: &TicketTable,
    ) -> Result<Option<CachedTicket>, CacheError> {
        let sys_id = sys_id.to_string();
        let table = table.as_str().to_string();

        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT document, cached_at, expires_at, refresh_priority, checksum, version
                     FROM ticket_cache WHERE sys_id = ? AND ticket_table = ?",
                    params![sys_id, table],
                    Self::row_to_cached,
                )
                .optional()
                .map_err(|e| CacheError::Database(e.to_string()))?;

            let Some((document, cached_at, expires_at, priority, checksum, version)) = row
            else {
                return Ok(None);
            };

            let key = format!("{}:{}", table, sys_id);
            let record: TicketRecord =
                serde_json::from_str(&document).map_err(|e| CacheError::Corrupt {
                    key: key.clone(),
                    reason: e.to_string(),
                })?;

            Ok(Some(CachedTicket {
                record,
                metadata: CacheMetadata {
                    cached_at: parse_timestamp(&key, &cached_at)?,
                    expires_at: parse_timestamp(&key, &expires_at)?,
                    refresh_priority: RefreshPriority::parse(&priority),
                    version: u64::try_from(version).unwrap_or(1),
                    checksum,
                },
            }))
        })
        .await
    }

    async fn upsert(&self, ticket: &CachedTicket) -> Result<u64, CacheError> {
        let document = serde_json::to_string(&ticket.record)
            .map_err(|e| CacheError::Database(e.to_string()))?;
        let sys_id = ticket.record.sys_id.clone();
        let table = ticket.record.table.as_str().to_string();
        let cached_at = format_timestamp(ticket.metadata.cached_at);
        let expires_at = format_timestamp(ticket.metadata.expires_at);
        let priority = ticket.metadata.refresh_priority.as_str();
        let checksum = ticket.metadata.checksum.clone();

        self.with_conn(move |conn| {
            let version: i64 = conn
                .query_row(
                    "INSERT INTO ticket_cache (sys_id, ticket_table, document, cached_at, expires_at, refresh_priority, checksum, version)
                     VALUES (?, ?, ?, ?, ?, ?, ?, 1)
                     ON CONFLICT(sys_id, ticket_table) DO UPDATE SET
                        document = excluded.document,
                        cached_at = excluded.cached_at,
                        expires_at = excluded.expires_at,
                        refresh_priority = excluded.refresh_priority,
                        checksum = excluded.checksum,
                        version = ticket_cache.version + 1
                     RETURNING version",
                    params![sys_id, table, document, cached_at, expires_at, priority, checksum],
                    |row| row.get(0),
                )
                .map_err(|e| CacheError::Database(e.to_string()))?;

            Ok(u64::try_from(version).unwrap_or(1))
        })
        .await
    }

    async fn delete(&self, table: &TicketTable, sys_id: &str) -> Result<(), CacheError> {
        let sys_id = sys_id.to_string();
        let table = table.as_str().to_string();

        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM ticket_cache WHERE sys_id = ? AND ticket_table = ?",
                params![sys_id, table],
            )
            .map_err(|e| CacheError::Database(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn count_documents(&self) -> Result<u64, CacheError> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM ticket_cache", [], |row| row.get(0))
                .map_err(|e| CacheError::Database(e.to_string()))?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::freshness::FreshnessDecision;
    use chrono::Duration;
    use serde_json::json;

    fn create_test_cache() -> SqliteDurableCache {
        SqliteDurableCache::in_memory().expect("Failed to create in-memory cache")
    }

    fn cached(sys_id: &str, ttl_ms: u64) -> CachedTicket {
        let mut record = TicketRecord::new(sys_id, TicketTable::Incident)
            .with_number("INC001")
            .with_state("2")
            .with_priority("3");
        record.slms.push(json!({ "sys_id": "sla-1", "stage": "in_progress" }));

        CachedTicket::new(
            record,
            &FreshnessDecision {
                ttl_ms,
                refresh_priority: RefreshPriority::Medium,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_upsert_and_find() {
        let cache = create_test_cache();
        let entry = cached("test-123", 60_000);

        let version = cache.upsert(&entry).await.unwrap();
        assert_eq!(version, 1);

        let found = cache
            .find_by_key("test-123", &TicketTable::Incident)
            .await
            .unwrap()
            .expect("entry should exist");

        assert_eq!(found.record, entry.record);
        assert_eq!(found.metadata.refresh_priority, RefreshPriority::Medium);
        assert_eq!(found.metadata.checksum, entry.metadata.checksum);
        assert!(found.verify_checksum());
        // Millisecond precision survives the round trip.
        assert_eq!(
            found.metadata.expires_at.timestamp_millis(),
            entry.metadata.expires_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_find_missing_returns_none() {
        let cache = create_test_cache();
        let found = cache
            .find_by_key("missing", &TicketTable::Incident)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_key_includes_table() {
        let cache = create_test_cache();
        cache.upsert(&cached("shared-id", 60_000)).await.unwrap();

        let other_table = cache
            .find_by_key("shared-id", &TicketTable::ChangeTask)
            .await
            .unwrap();
        assert!(other_table.is_none());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_and_bumps_version() {
        let cache = create_test_cache();
        cache.upsert(&cached("test-123", 60_000)).await.unwrap();

        let mut updated = cached("test-123", 60_000);
        updated.record.state = "6".to_string();
        updated.metadata.checksum = updated.record.checksum();
        let version = cache.upsert(&updated).await.unwrap();
        assert_eq!(version, 2);

        let found = cache
            .find_by_key("test-123", &TicketTable::Incident)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.record.state, "6");
        assert_eq!(found.metadata.version, 2);
        assert_eq!(cache.count_documents().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let cache = create_test_cache();
        cache.upsert(&cached("test-123", 60_000)).await.unwrap();

        cache.delete(&TicketTable::Incident, "test-123").await.unwrap();
        cache.delete(&TicketTable::Incident, "test-123").await.unwrap();

        assert_eq!(cache.count_documents().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_entries_are_returned_as_stored() {
        let cache = create_test_cache();
        let mut entry = cached("old", 1_000);
        entry.metadata.cached_at = Utc::now() - Duration::hours(2);
        entry.metadata.expires_at = Utc::now() - Duration::hours(1);
        cache.upsert(&entry).await.unwrap();

        let found = cache
            .find_by_key("old", &TicketTable::Incident)
            .await
            .unwrap()
            .unwrap();
        assert!(!found.is_fresh_at(Utc::now()));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = create_test_cache();
        let mut expired = cached("old", 1_000);
        expired.metadata.expires_at = Utc::now() - Duration::minutes(5);
        cache.upsert(&expired).await.unwrap();
        cache.upsert(&cached("fresh", 3_600_000)).await.unwrap();

        let removed = cache.purge_expired(Utc::now()).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(cache.count_documents().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_health_check() {
        let cache = create_test_cache();
        assert!(cache.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_reported() {
        let cache = create_test_cache();
        cache.upsert(&cached("test-123", 60_000)).await.unwrap();
        cache
            .with_conn(|conn| {
                conn.execute("UPDATE ticket_cache SET document = 'not json'", [])
                    .map_err(|e| CacheError::Database(e.to_string()))?;
                Ok(())
            })
            .await
            .unwrap();

        let result = cache.find_by_key("test-123", &TicketTable::Incident).await;
        assert!(matches!(result, Err(CacheError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_file_based_cache() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("cache.db");

        {
            let cache = SqliteDurableCache::new(&db_path).unwrap();
            cache.upsert(&cached("persisted", 60_000)).await.unwrap();
        }

        assert!(db_path.exists());
        let reopened = SqliteDurableCache::new(&db_path).unwrap();
        assert_eq!(reopened.count_documents().await.unwrap(), 1);
    }
}
