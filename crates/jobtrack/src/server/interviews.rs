//! `/api/interviews`.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use jobtrack_core::{Interview, NewInterview};
use serde_json::Value;

use super::{ApiError, AppState, message, parse_body};

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Interview>>, ApiError> {
    Ok(Json(state.interviews()?.list().await?))
}

/// Replaces the whole schedule with the posted list.
pub async fn replace(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let interviews: Vec<NewInterview> = parse_body(&body)?;
    state.interviews()?.replace_all(&interviews).await?;
    Ok(message("Interview data saved successfully"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::super::testing::{send, state_in};

    #[tokio::test]
    async fn test_replace_then_list() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path()).await;

        let (status, _) = send(
            &state,
            "POST",
            "/api/interviews",
            Some(json!([
                { "company": "JD", "position": "Sales", "datetime": "2025-09-28T15:00" },
                { "company": "Tencent", "position": "Frontend", "datetime": "2025-09-20T09:00",
                  "preparation": true }
            ])),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&state, "GET", "/api/interviews", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["company"], "Tencent");
        assert_eq!(body[0]["datetime"], "2025-09-20T09:00");
        assert_eq!(body[0]["preparation"], true);
        assert_eq!(body[1]["completion"], false);
    }

    #[tokio::test]
    async fn test_empty_list_clears_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path()).await;
        send(
            &state,
            "POST",
            "/api/interviews",
            Some(json!([{ "company": "JD", "position": "Sales" }])),
        )
        .await;

        let (status, _) = send(&state, "POST", "/api/interviews", Some(json!([]))).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(&state, "GET", "/api/interviews", None).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_invalid_entries_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path()).await;

        let (status, _) = send(
            &state,
            "POST",
            "/api/interviews",
            Some(json!([{ "company": "JD", "position": "Sales", "datetime": "soon" }])),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &state,
            "POST",
            "/api/interviews",
            Some(json!([{ "company": "", "position": "Sales" }])),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&state, "POST", "/api/interviews", Some(json!({ "a": 1 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
