//! `/api/config`.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use jobtrack_core::AppConfig;
use serde_json::Value;

use super::{ApiError, AppState, parse_body};

pub async fn show(State(state): State<AppState>) -> Json<AppConfig> {
    Json(state.config.snapshot().as_ref().clone())
}

/// Merges the posted sections and persists them.
pub async fn update(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AppConfig>, ApiError> {
    let patch: Value = parse_body(&body)?;
    let store = state.config.clone();
    let updated = tokio::task::spawn_blocking(move || store.update(&patch))
        .await
        .map_err(|e| ApiError::Internal {
            message: "Configuration update was interrupted".to_string(),
            details: Some(e.to_string()),
        })??;
    Ok(Json(updated.as_ref().clone()))
}
