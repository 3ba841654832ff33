//! Ticket API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use snowdash_core::{OrchestratorError, TicketDetails, TicketTable};
use std::sync::Arc;
use tracing::warn;

use super::handlers::ErrorResponse;
use crate::state::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Resolve a path segment to a supported ticket table.
fn parse_table(table: &str) -> Result<TicketTable, ApiError> {
    match TicketTable::parse(table) {
        TicketTable::Other(name) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!(
                "Unsupported ticket table: {}",
                name
            ))),
        )),
        known => Ok(known),
    }
}

fn orchestrator_error(err: OrchestratorError) -> ApiError {
    warn!("Ticket request failed: {}", err);
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse::new(err.to_string())),
    )
}

/// Get a ticket through the read-through cache
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path((table, sys_id)): Path<(String, String)>,
) -> Result<Json<TicketDetails>, ApiError> {
    let table = parse_table(&table)?;

    match state
        .orchestrator()
        .get_ticket_details(&sys_id, &table)
        .await
    {
        Ok(Some(details)) => Ok(Json(details)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!(
                "Ticket not found: {}:{}",
                table, sys_id
            ))),
        )),
        Err(e) => Err(orchestrator_error(e)),
    }
}

/// Drop the cached copy of a ticket
pub async fn invalidate_ticket(
    State(state): State<Arc<AppState>>,
    Path((table, sys_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let table = parse_table(&table)?;

    state
        .orchestrator()
        .invalidate_ticket(&sys_id, &table)
        .await
        .map_err(orchestrator_error)?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table_accepts_aliases() {
        assert_eq!(parse_table("incident").unwrap(), TicketTable::Incident);
        assert_eq!(parse_table("change-task").unwrap(), TicketTable::ChangeTask);
        assert_eq!(parse_table("sc_task").unwrap(), TicketTable::CatalogTask);
    }

    #[test]
    fn test_parse_table_rejects_unknown() {
        let (status, _) = parse_table("sys_user").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
