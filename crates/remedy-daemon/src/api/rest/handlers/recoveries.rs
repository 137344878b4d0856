//! Recovery submission handler.

use crate::api::rest::state::AppState;
use axum::{extract::State, Json};
use remedy_types::{PlaybookExecutionResult, RecoveryRequest};

/// Execute the playbook for a classified failure. The caller (webhook
/// pipeline, AI classifier, operator) is responsible for classification;
/// the response carries the full decision trail.
pub async fn submit_recovery(
    State(state): State<AppState>,
    Json(request): Json<RecoveryRequest>,
) -> Json<PlaybookExecutionResult> {
    tracing::info!(
        error_type = %request.error_type,
        ticket = ?request.ticket_id,
        "recovery request received"
    );

    let result = state.executor.execute(&request).await;
    Json(result)
}
