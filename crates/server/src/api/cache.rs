//! Cache statistics handler.

use axum::{extract::State, http::StatusCode, Json};
use snowdash_core::CacheStatsReport;
use std::sync::Arc;

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// Durable cache population and hit ratio
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CacheStatsReport>, (StatusCode, Json<ErrorResponse>)> {
    state
        .orchestrator()
        .get_cache_stats()
        .await
        .map(Json)
        .map_err(|e| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new(e.to_string())),
            )
        })
}
