//! `/api/deliveries`.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use jobtrack_core::{Delivery, NewDelivery};
use serde_json::{Value, json};

use super::{ApiError, AppState, message, parse_body, parse_id};

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Delivery>>, ApiError> {
    Ok(Json(state.deliveries()?.list().await?))
}

pub async fn create(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let delivery: NewDelivery = parse_body(&body)?;
    let id = state.deliveries()?.insert(&delivery).await?;
    Ok(Json(json!({ "message": "Delivery record added successfully", "id": id })))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "delivery")?;
    let delivery: NewDelivery = parse_body(&body)?;
    state.deliveries()?.update(id, &delivery).await?;
    Ok(message("Delivery record updated successfully"))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "delivery")?;
    state.deliveries()?.delete(id).await?;
    Ok(message("Delivery record deleted successfully"))
}
