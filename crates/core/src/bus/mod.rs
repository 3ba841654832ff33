//! Change bus: optional notification channel for cache changes.
//!
//! Publishing is advisory. Nothing on the read path depends on delivery.

mod broadcast;

pub use broadcast::BroadcastChangeBus;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::freshness::RefreshPriority;
use crate::ticket::{CachedTicket, TicketKey, TicketTable};

/// Errors raised by change bus backends.
#[derive(Debug, Error)]
pub enum ChangeBusError {
    #[error("Change bus closed")]
    Closed,

    #[error("Failed to publish change: {0}")]
    Publish(String),
}

/// What happened to the cached copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// A fresh copy was written.
    Refreshed,
    /// The copy was removed.
    Invalidated,
}

/// Identifier assigned to a published event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Announcement that a ticket's cached copy changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event_id: Uuid,
    pub sys_id: String,
    pub table: TicketTable,
    pub kind: ChangeKind,
    /// Present for refreshes only.
    pub refresh_priority: Option<RefreshPriority>,
    pub expires_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn refreshed(ticket: &CachedTicket) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            sys_id: ticket.record.sys_id.clone(),
            table: ticket.record.table.clone(),
            kind: ChangeKind::Refreshed,
            refresh_priority: Some(ticket.metadata.refresh_priority),
            expires_at: Some(ticket.metadata.expires_at),
            occurred_at: Utc::now(),
        }
    }

    pub fn invalidated(key: &TicketKey) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            sys_id: key.sys_id.clone(),
            table: key.table.clone(),
            kind: ChangeKind::Invalidated,
            refresh_priority: None,
            expires_at: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn key(&self) -> TicketKey {
        TicketKey::new(self.sys_id.clone(), self.table.clone())
    }
}

/// Publish channel for [`ChangeEvent`]s.
#[async_trait]
pub trait ChangeBus: Send + Sync {
    async fn publish_change(&self, event: &ChangeEvent) -> Result<MessageId, ChangeBusError>;

    async fn health_check(&self) -> Result<(), ChangeBusError>;
}
