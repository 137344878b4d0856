//! API router configuration.

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router.
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let api_routes = Router::new()
        // Health and status
        .route("/health", get(handlers::health_check))
        // Circuit breakers
        .route("/circuit-breakers", get(handlers::list_circuit_breakers))
        .route(
            "/circuit-breakers/:key/reset",
            post(handlers::reset_circuit_breaker),
        )
        // Playbook catalog
        .route(
            "/supported-error-types",
            get(handlers::list_supported_error_types),
        )
        // Recovery submission
        .route("/recoveries", post(handlers::submit_recovery));

    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.with_state(state)
}
