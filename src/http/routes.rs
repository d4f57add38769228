use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Bot control
        .route("/bots", post(handlers::create_bot).get(handlers::list_bots))
        .route("/bots/:job_id", get(handlers::get_bot))
        .route("/bots/:job_id/stop", post(handlers::stop_bot))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
