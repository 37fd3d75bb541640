use std::time::Duration;

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use tokio::time::{Instant, sleep};

use crate::{AppState, error::AppError};

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const HEALTH_PATH: &str = "/api/health";

/// Holds requests while the database is still coming up, then gives up with 503.
pub async fn require_database(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if req.uri().path() == HEALTH_PATH {
        return Ok(next.run(req).await);
    }

    let deadline = Instant::now() + state.config.db_init_timeout();
    while !state.db.is_initialized() && !state.db.has_failed() && Instant::now() < deadline {
        sleep(POLL_INTERVAL).await;
    }

    if state.db.has_failed() {
        return Err(AppError::ServiceUnavailable(
            "Database unavailable. Please try again later.".to_string(),
        ));
    }
    if !state.db.is_initialized() {
        return Err(AppError::ServiceUnavailable(
            "Database initialization in progress. Please try again later.".to_string(),
        ));
    }

    Ok(next.run(req).await)
}
