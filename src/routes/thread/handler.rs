use axum::extract::{Json, State};

use super::model::{ThreadNameRequest, ThreadNameResponse, generate_thread_name};
use crate::{AppState, error::AppError};

#[axum::debug_handler]
pub async fn generate_name(
    State(state): State<AppState>,
    Json(req): Json<ThreadNameRequest>,
) -> Result<Json<ThreadNameResponse>, AppError> {
    if req.message.trim().is_empty() {
        return Err(AppError::BadRequest("Message cannot be empty".to_string()));
    }

    let name = generate_thread_name(
        state.llm.as_ref(),
        &state.config.thread_name_model,
        &req.message,
    )
    .await;
    tracing::debug!("Generated thread name: {}", name);

    Ok(Json(ThreadNameResponse { name }))
}
