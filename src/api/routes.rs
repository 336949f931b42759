use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = if state.config.cors_allow_any {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        // Outermost, so the trace span can see the request id
        .layer(middleware::from_fn(request_id_middleware))
}

/// Routes under /api
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/recommend", get(handlers::recommend))
        .route("/suggestions", get(handlers::suggestions))
        .route("/status", get(handlers::status))
        .route("/build", post(handlers::build))
        .route("/poster", get(handlers::poster))
}
