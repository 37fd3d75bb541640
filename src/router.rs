use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use crate::{
    AppState,
    middleware::{RateLimiter, log_errors, rate_limit, require_database},
    routes,
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/generate-thread-name", post(routes::thread::generate_name))
        .route("/db-fix", get(routes::admin::db_fix))
}

/// Full application: `/api` routes behind, from outermost in, CORS, access
/// logging, rate limiting and the database readiness gate.
pub fn create_router(state: AppState, limiter: Arc<RateLimiter>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_database,
        ))
        .layer(axum::middleware::from_fn_with_state(limiter, rate_limit))
        .layer(axum::middleware::from_fn(log_errors))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
