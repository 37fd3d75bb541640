use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub instance: String,
    pub timestamp: String,
    pub environment: String,
    pub db_initialized: bool,
}

/// 200 `ok` while running or still starting; 503 `error` once database
/// initialization has given up, so liveness checks restart the instance.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status) = if state.db.has_failed() {
        (StatusCode::SERVICE_UNAVAILABLE, "error")
    } else {
        (StatusCode::OK, "ok")
    };

    let body = HealthResponse {
        status: status.to_string(),
        instance: state.config.instance_id.clone(),
        timestamp: Utc::now().to_rfc3339(),
        environment: state.config.env_mode.to_string(),
        db_initialized: state.db.is_initialized(),
    };
    (code, Json(body))
}
