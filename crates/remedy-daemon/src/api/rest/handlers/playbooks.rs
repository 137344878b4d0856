//! Playbook catalog handlers.

use crate::api::rest::state::AppState;
use axum::{extract::State, Json};
use remedy_types::PlaybookView;

/// List the error types the engine knows how to recover, with their
/// strategies.
pub async fn list_supported_error_types(
    State(state): State<AppState>,
) -> Json<Vec<PlaybookView>> {
    Json(state.registry.public_views())
}
