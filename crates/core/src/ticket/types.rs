use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::freshness::{FreshnessDecision, RefreshPriority};

/// Ticket type discriminator (the upstream table the record lives in).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TicketTable {
    Incident,
    ChangeTask,
    CatalogTask,
    Other(String),
}

impl TicketTable {
    /// Parse a table name, accepting the common aliases used by the dashboard.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "incident" => Self::Incident,
            "change_task" | "change-task" => Self::ChangeTask,
            "sc_task" | "catalog_task" | "catalog-task" => Self::CatalogTask,
            other => Self::Other(other.to_string()),
        }
    }

    /// Upstream table name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Incident => "incident",
            Self::ChangeTask => "change_task",
            Self::CatalogTask => "sc_task",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for TicketTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for TicketTable {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<TicketTable> for String {
    fn from(table: TicketTable) -> Self {
        table.as_str().to_string()
    }
}

/// Cache key: a ticket is identified by its sys_id within a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketKey {
    pub sys_id: String,
    pub table: TicketTable,
}

impl TicketKey {
    pub fn new(sys_id: impl Into<String>, table: TicketTable) -> Self {
        Self {
            sys_id: sys_id.into(),
            table,
        }
    }
}

impl fmt::Display for TicketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table, self.sys_id)
    }
}

/// Canonical ticket projection mirrored from the source of truth.
///
/// Holds no cache metadata; see [`CachedTicket`] for the persisted form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub sys_id: String,
    pub table: TicketTable,
    #[serde(default)]
    pub number: Option<String>,
    /// Raw upstream state code (e.g. "2" for In Progress).
    #[serde(default)]
    pub state: String,
    /// Raw upstream priority code (e.g. "1" for Critical).
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub assignment_group: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Remaining upstream fields, verbatim.
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// SLA records attached to the ticket.
    #[serde(default)]
    pub slms: Vec<Value>,
}

impl TicketRecord {
    pub fn new(sys_id: impl Into<String>, table: TicketTable) -> Self {
        Self {
            sys_id: sys_id.into(),
            table,
            number: None,
            state: String::new(),
            priority: String::new(),
            short_description: None,
            assignment_group: None,
            created_at: None,
            updated_at: None,
            attributes: Map::new(),
            slms: Vec::new(),
        }
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = priority.into();
        self
    }

    pub fn with_short_description(mut self, description: impl Into<String>) -> Self {
        self.short_description = Some(description.into());
        self
    }

    pub fn key(&self) -> TicketKey {
        TicketKey::new(self.sys_id.clone(), self.table.clone())
    }

    /// SHA-256 over the canonical JSON encoding of the record.
    pub fn checksum(&self) -> String {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        format!("{:x}", Sha256::digest(&encoded))
    }
}

/// Where a returned ticket was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordSource {
    DurableCache,
    SourceOfTruth,
}

impl RecordSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DurableCache => "durable-cache",
            Self::SourceOfTruth => "source-of-truth",
        }
    }
}

/// Metadata owned by the cache layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub cached_at: DateTime<Utc>,
    /// Always `cached_at + ttl` of the freshness decision in force at write time.
    pub expires_at: DateTime<Utc>,
    pub refresh_priority: RefreshPriority,
    /// Incremented by the durable cache on every overwrite.
    pub version: u64,
    pub checksum: String,
}

impl CacheMetadata {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A ticket together with its cache metadata; the only form the durable cache stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedTicket {
    pub record: TicketRecord,
    pub metadata: CacheMetadata,
}

impl CachedTicket {
    /// Wrap a freshly fetched record, deriving expiry from the freshness decision.
    pub fn new(record: TicketRecord, decision: &FreshnessDecision, cached_at: DateTime<Utc>) -> Self {
        let ttl = Duration::milliseconds(i64::try_from(decision.ttl_ms).unwrap_or(i64::MAX));
        let expires_at = cached_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let checksum = record.checksum();

        Self {
            record,
            metadata: CacheMetadata {
                cached_at,
                expires_at,
                refresh_priority: decision.refresh_priority,
                version: 1,
                checksum,
            },
        }
    }

    pub fn key(&self) -> TicketKey {
        self.record.key()
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        !self.metadata.is_expired_at(now)
    }

    /// Whether the stored checksum still matches the record contents.
    pub fn verify_checksum(&self) -> bool {
        self.metadata.checksum == self.record.checksum()
    }
}
