//! Circuit-breaker inspection and reset handlers.

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    Json,
};
use remedy_types::{BreakerKey, BreakerSnapshot};
use serde::Serialize;

/// List every breaker's state.
pub async fn list_circuit_breakers(State(state): State<AppState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.breakers.snapshot_all())
}

/// Reset response.
#[derive(Debug, Serialize)]
pub struct ResetBreakerResponse {
    pub key: String,
    pub state: String,
}

/// Force a breaker closed. The key uses the `ErrorType:resource_id` wire
/// form. Does not interfere with in-flight executions.
pub async fn reset_circuit_breaker(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<ResetBreakerResponse>> {
    let breaker_key = BreakerKey::parse(&key)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid breaker key: {key}")))?;

    if !state.breakers.reset(&breaker_key) {
        return Err(ApiError::NotFound(format!("no breaker for key {key}")));
    }

    tracing::info!(key = %breaker_key, "breaker reset by operator");

    Ok(Json(ResetBreakerResponse {
        key: breaker_key.to_string(),
        state: "closed".to_string(),
    }))
}
