//! Source of truth: the authoritative upstream ticket system.
//!
//! The orchestrator only needs a field-complete fetch and a health probe.
//! [`ServiceNowClient`] implements both against the ServiceNow Table API.

mod servicenow;

pub use servicenow::{ServiceNowClient, ServiceNowConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ticket::{TicketRecord, TicketTable};

/// Errors that can occur when talking to the source of truth.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Credentials were rejected.
    #[error("Upstream rejected credentials (HTTP {0})")]
    Unauthorized(u16),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded, please wait before retrying")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Client not configured (missing instance URL, credentials, etc.).
    #[error("Client not configured: {0}")]
    NotConfigured(String),

    /// Upstream is not accepting requests.
    #[error("Source of truth unavailable: {0}")]
    Unavailable(String),
}

/// Record filter for [`SourceOfTruth::fetch_full_record`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    /// Restrict to a single record.
    #[serde(default)]
    pub sys_id: Option<String>,
    /// Additional encoded query clause, e.g. `active=true^priority=1`.
    #[serde(default)]
    pub query: Option<String>,
    /// Maximum number of records to return.
    #[serde(default)]
    pub limit: Option<u32>,
}

impl RecordFilter {
    /// Filter matching exactly one sys_id.
    pub fn by_sys_id(sys_id: impl Into<String>) -> Self {
        Self {
            sys_id: Some(sys_id.into()),
            query: None,
            limit: Some(1),
        }
    }

    /// Combine the filter into a single encoded query string.
    pub fn encoded_query(&self) -> Option<String> {
        let clauses: Vec<String> = self
            .sys_id
            .iter()
            .map(|id| format!("sys_id={}", id))
            .chain(self.query.iter().filter(|q| !q.is_empty()).cloned())
            .collect();

        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join("^"))
        }
    }
}

/// Records returned by a fetch. Empty means nothing matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub result: Vec<TicketRecord>,
}

impl FetchResult {
    pub fn into_first(self) -> Option<TicketRecord> {
        self.result.into_iter().next()
    }
}

/// The authoritative upstream ticket system.
#[async_trait]
pub trait SourceOfTruth: Send + Sync {
    /// Fetch complete records (SLAs included) matching the filter.
    async fn fetch_full_record(
        &self,
        table: &TicketTable,
        filter: &RecordFilter,
    ) -> Result<FetchResult, SourceError>;

    /// Probe upstream reachability.
    async fn get_health_status(&self) -> Result<(), SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_query_by_sys_id() {
        let filter = RecordFilter::by_sys_id("abc");
        assert_eq!(filter.encoded_query().as_deref(), Some("sys_id=abc"));
        assert_eq!(filter.limit, Some(1));
    }

    #[test]
    fn test_encoded_query_combines_clauses() {
        let filter = RecordFilter {
            sys_id: Some("abc".to_string()),
            query: Some("active=true".to_string()),
            limit: None,
        };
        assert_eq!(
            filter.encoded_query().as_deref(),
            Some("sys_id=abc^active=true")
        );
    }

    #[test]
    fn test_encoded_query_empty() {
        assert!(RecordFilter::default().encoded_query().is_none());
        let filter = RecordFilter {
            query: Some(String::new()),
            ..Default::default()
        };
        assert!(filter.encoded_query().is_none());
    }
}
