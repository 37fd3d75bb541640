use axum::extract::{Json, State};
use serde_json::{Value, json};

use crate::{
    AppState,
    database::{DatabaseError, operations::schema::apply_database_fixes},
    error::AppError,
};

pub async fn db_fix(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let pool = state.db.pool().await.map_err(|e| match e {
        DatabaseError::NotConfigured => {
            AppError::ServiceUnavailable("Database is not configured".to_string())
        }
        other => AppError::Internal(format!("Failed to apply database fixes: {}", other)),
    })?;

    apply_database_fixes(&pool).await.map_err(|e| {
        tracing::error!("Error applying database fixes: {}", e);
        AppError::Internal(format!("Failed to apply database fixes: {}", e))
    })?;

    Ok(Json(json!({"status": "Database fixes applied successfully"})))
}
