//! `/api/emails`.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use jobtrack_core::{EmailRecord, MergeReport, NewEmail};
use serde::Deserialize;
use serde_json::Value;

use super::{ApiError, AppState, message, parse_body, parse_id};

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    keyword: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeliveredUpdate {
    delivered: bool,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<EmailRecord>>, ApiError> {
    Ok(Json(state.emails()?.list().await?))
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<EmailRecord>>, ApiError> {
    let keyword = params.keyword.unwrap_or_default();
    Ok(Json(state.emails()?.search(&keyword).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "email")?;
    state.emails()?.delete(id).await?;
    Ok(message("Email deleted successfully"))
}

pub async fn set_delivered(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "email")?;
    let update: DeliveredUpdate = parse_body(&body)?;
    state.emails()?.set_delivered(id, update.delivered).await?;
    Ok(message("Delivered status updated successfully"))
}

/// Merges a posted array of candidates, skipping ones already stored.
pub async fn import(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MergeReport>, ApiError> {
    let candidates: Vec<NewEmail> = parse_body(&body)?;
    Ok(Json(state.emails()?.merge(&candidates).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use super::super::AppState;
    use super::super::testing::{send, state_in};

    fn candidates() -> Value {
        json!([
            { "imap_id": "1", "subject": "Interview invitation", "sender": "hr@acme.example",
              "recipient": "me@example.com", "send_date": "2025-09-01 10:00:00" },
            { "imap_id": "2", "subject": "Rejection", "sender": "hr@globex.example",
              "recipient": "me@example.com", "send_date": "2025-09-02 10:00:00",
              "body": "Unfortunately, the INTERVIEW slots are full" }
        ])
    }

    async fn seeded() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path()).await;
        send(&state, "POST", "/api/emails/import", Some(candidates())).await;
        (dir, state)
    }

    #[tokio::test]
    async fn test_import_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path()).await;

        let (status, body) = send(&state, "POST", "/api/emails/import", Some(candidates())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "processed": 2, "inserted": 2 }));

        let (_, body) = send(&state, "POST", "/api/emails/import", Some(candidates())).await;
        assert_eq!(body, json!({ "processed": 2, "inserted": 0 }));
    }

    #[tokio::test]
    async fn test_list_and_search() {
        let (_dir, state) = seeded().await;

        let (status, body) = send(&state, "GET", "/api/emails", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["imap_id"], "2");
        assert_eq!(body[0]["delivered"], false);

        let (_, body) = send(&state, "GET", "/api/emails/search?keyword=interview", None).await;
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (_, body) = send(&state, "GET", "/api/emails/search?keyword=rejection", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, body) = send(&state, "GET", "/api/emails/search", None).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delivered_and_delete() {
        let (_dir, state) = seeded().await;
        let (_, body) = send(&state, "GET", "/api/emails", None).await;
        let id = body[1]["id"].as_i64().unwrap();

        let (status, _) = send(
            &state,
            "PUT",
            &format!("/api/emails/{id}/delivered"),
            Some(json!({ "delivered": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(&state, "GET", "/api/emails", None).await;
        assert_eq!(body[1]["delivered"], true);
        assert_eq!(body[0]["delivered"], false);

        let (status, _) = send(&state, "DELETE", &format!("/api/emails/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&state, "DELETE", &format!("/api/emails/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], format!("Email {id} not found"));
    }

    #[tokio::test]
    async fn test_malformed_requests() {
        let (_dir, state) = seeded().await;

        let (status, _) = send(&state, "DELETE", "/api/emails/x1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &state,
            "PUT",
            "/api/emails/1/delivered",
            Some(json!({ "delivered": "yes" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &state,
            "PUT",
            "/api/emails/999/delivered",
            Some(json!({ "delivered": true })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
