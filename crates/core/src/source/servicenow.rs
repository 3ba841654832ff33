//! ServiceNow Table API client.
//!
//! Records are fetched with `sysparm_exclude_reference_link=true` so
//! reference fields come back as plain values. SLA records live in the
//! `task_sla` table and are attached to the ticket when enabled.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{FetchResult, RecordFilter, SourceError, SourceOfTruth};
use crate::ticket::{TicketRecord, TicketTable};

const SERVICENOW_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// ServiceNow connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceNowConfig {
    /// Instance base URL, e.g. `https://example.service-now.com`.
    pub instance_url: String,
    pub username: String,
    pub password: String,
    /// Per-request HTTP timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attach `task_sla` records to fetched tickets.
    #[serde(default = "default_include_slas")]
    pub include_slas: bool,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_include_slas() -> bool {
    true
}

/// ServiceNow Table API client.
pub struct ServiceNowClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    include_slas: bool,
}

#[derive(Debug, Deserialize)]
struct TableResponse {
    #[serde(default)]
    result: Vec<Map<String, Value>>,
}

impl ServiceNowClient {
    /// Create a new ServiceNow client.
    pub fn new(config: ServiceNowConfig) -> Result<Self, SourceError> {
        if config.instance_url.trim().is_empty() {
            return Err(SourceError::NotConfigured(
                "ServiceNow instance URL is required".to_string(),
            ));
        }
        if config.username.is_empty() {
            return Err(SourceError::NotConfigured(
                "ServiceNow username is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.instance_url.trim_end_matches('/').to_string(),
            username: config.username,
            password: config.password,
            include_slas: config.include_slas,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/api/now/table/{}", self.base_url, table)
    }

    async fn query_table(
        &self,
        table: &str,
        query: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<Map<String, Value>>, SourceError> {
        let url = self.table_url(table);

        debug!("ServiceNow query: table={}, query={:?}", table, query);

        let mut request = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
            .query(&[("sysparm_exclude_reference_link", "true")]);

        if let Some(q) = query {
            request = request.query(&[("sysparm_query", q)]);
        }
        if let Some(l) = limit {
            request = request.query(&[("sysparm_limit", l.to_string())]);
        }

        let response = check_status(request.send().await?).await?;

        let body: TableResponse = response.json().await.map_err(|e| {
            SourceError::Parse(format!("Failed to parse {} response: {}", table, e))
        })?;

        Ok(body.result)
    }

    async fn fetch_slas(&self, sys_id: &str) -> Result<Vec<Value>, SourceError> {
        let query = format!("task={}", sys_id);
        let rows = self.query_table("task_sla", Some(&query), None).await?;
        Ok(rows.into_iter().map(Value::Object).collect())
    }
}

async fn check_status(response: Response) -> Result<Response, SourceError> {
    let status = response.status();
    if status == 401 || status == 403 {
        return Err(SourceError::Unauthorized(status.as_u16()));
    }
    if status == 429 {
        return Err(SourceError::RateLimited);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SourceError::Api {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(response)
}

/// Read a field as a string. Reference fields may arrive as
/// `{ "value": .., "display_value": .. }` objects.
fn field_string(row: &Map<String, Value>, name: &str) -> Option<String> {
    let value = match row.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(obj) => obj
            .get("display_value")
            .or_else(|| obj.get("value"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    };
    value.filter(|s| !s.is_empty())
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    let value = value?;
    NaiveDateTime::parse_from_str(&value, SERVICENOW_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(&value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

/// Project a raw Table API row onto a [`TicketRecord`].
///
/// Projected fields are removed from `attributes`; everything else is kept.
fn parse_row(table: &TicketTable, mut row: Map<String, Value>) -> Result<TicketRecord, SourceError> {
    let sys_id = field_string(&row, "sys_id")
        .ok_or_else(|| SourceError::Parse(format!("{} row without sys_id", table)))?;

    let mut record = TicketRecord::new(sys_id, table.clone());
    record.number = field_string(&row, "number");
    record.state = field_string(&row, "state").unwrap_or_default();
    record.priority = field_string(&row, "priority").unwrap_or_default();
    record.short_description = field_string(&row, "short_description");
    record.assignment_group = field_string(&row, "assignment_group");
    record.created_at = parse_timestamp(field_string(&row, "sys_created_on"));
    record.updated_at = parse_timestamp(field_string(&row, "sys_updated_on"));

    for projected in [
        "sys_id",
        "number",
        "state",
        "priority",
        "short_description",
        "assignment_group",
        "sys_created_on",
        "sys_updated_on",
    ] {
        row.remove(projected);
    }
    record.attributes = row;

    Ok(record)
}

#[async_trait]
impl SourceOfTruth for ServiceNowClient {
    async fn fetch_full_record(
        &self,
        table: &TicketTable,
        filter: &RecordFilter,
    ) -> Result<FetchResult, SourceError> {
        let query = filter.encoded_query();
        let rows = self
            .query_table(table.as_str(), query.as_deref(), filter.limit)
            .await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let mut record = parse_row(table, row)?;
            if self.include_slas {
                record.slms = self.fetch_slas(&record.sys_id).await?;
            }
            result.push(record);
        }

        debug!(
            "ServiceNow fetch: table={}, query={:?}, records={}",
            table,
            query,
            result.len()
        );

        Ok(FetchResult { result })
    }

    async fn get_health_status(&self) -> Result<(), SourceError> {
        let response = self
            .client
            .get(self.table_url("sys_properties"))
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
            .query(&[("sysparm_limit", "1")])
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}
