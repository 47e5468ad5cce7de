//! Routes that run the external tasks.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use jobtrack_fetch::DateRange;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use super::{ApiError, AppState, MailboxOverrides, parse_body, parse_id};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FetchRequest {
    start_date: Option<String>,
    end_date: Option<String>,
}

impl FetchRequest {
    fn range(&self) -> Result<Option<DateRange>, ApiError> {
        fn present(value: Option<&str>) -> Option<&str> {
            value.map(str::trim).filter(|value| !value.is_empty())
        }

        match (
            present(self.start_date.as_deref()),
            present(self.end_date.as_deref()),
        ) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => Ok(Some(DateRange::parse(start, end)?)),
            _ => Err(ApiError::bad_request(
                "startDate and endDate must be given together",
            )),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponse {
    success: bool,
    message: String,
    inserted_count: u64,
    processed_count: u64,
}

fn overrides(headers: &HeaderMap) -> MailboxOverrides {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    MailboxOverrides {
        address: header("x-email-address"),
        secret: header("x-email-password"),
        host: header("x-imap-server"),
    }
}

/// Runs one sync, stores what it found and reports the counts.
pub async fn fetch_emails(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<FetchResponse>, ApiError> {
    let request: FetchRequest = if body.iter().all(u8::is_ascii_whitespace) {
        FetchRequest::default()
    } else {
        parse_body(&body)?
    };
    let range = request.range()?;
    let mailbox = state.mailbox(&overrides(&headers));
    let store = state.emails()?;

    let report = state
        .mail_sync()
        .sync(&mailbox, range.as_ref(), store)
        .await?;
    let counts = report.counts;
    info!(inserted = counts.inserted, "Fetch request completed");
    Ok(Json(FetchResponse {
        success: true,
        message: format!("邮件获取完成，新增 {} 封邮件", counts.inserted),
        inserted_count: counts.inserted,
        processed_count: counts.processed,
    }))
}

/// Refetches one body from the mail server by the stored external id.
pub async fn realtime_body(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "email")?;
    let email = state
        .emails()?
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Email not found".to_string()))?;
    let external_id = email
        .imap_id
        .filter(|imap_id| !imap_id.trim().is_empty())
        .ok_or_else(|| ApiError::NotFound("IMAP ID not found for this email".to_string()))?;

    let mailbox = state.mailbox(&overrides(&headers));
    let body = state.mail_sync().fetch_body(&external_id, &mailbox).await?;
    Ok(Json(json!({ "body": body })))
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::Path;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use jobtrack_core::NewEmail;
    use serde_json::{Value, json};

    use super::super::AppState;
    use super::super::testing::{send, send_request, state_in};

    /// Writes a config whose fetch and body tasks are shell scripts.
    fn configure(dir: &Path, fetch: &str, body: &str, timeout_secs: u64) {
        std::fs::write(dir.join("fetch.sh"), fetch).unwrap();
        std::fs::write(dir.join("body.sh"), body).unwrap();
        let config = json!({
            "email": {
                "address": "me@example.com",
                "password": "code",
                "imap_server": "imap.example.com"
            },
            "fetch": {
                "program": "sh",
                "script": "fetch.sh",
                "body_script": "body.sh",
                "working_dir": dir,
                "timeout_secs": timeout_secs,
                "grace_millis": 100
            }
        });
        std::fs::write(dir.join("config.json"), config.to_string()).unwrap();
    }

    async fn fetch(state: &AppState, body: Option<Value>) -> (StatusCode, Value) {
        send(state, "POST", "/api/fetch-emails", body).await
    }

    #[tokio::test]
    async fn test_fetch_reports_counts() {
        let dir = tempfile::tempdir().unwrap();
        configure(
            dir.path(),
            "echo '处理了 12 封邮件，新增 3 封'\n",
            "",
            30,
        );
        let state = state_in(dir.path()).await;

        let (status, body) = fetch(&state, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["insertedCount"], 3);
        assert_eq!(body["processedCount"], 12);
    }

    #[tokio::test]
    async fn test_fetch_passes_range_and_header_overrides() {
        let dir = tempfile::tempdir().unwrap();
        configure(
            dir.path(),
            "[ \"$1\" = other@example.com ] && [ \"$4 $5\" = '2025-09-15 2025-09-22' ] \
             && echo \"获取到 $# 封新邮件\"\n",
            "",
            30,
        );
        let state = state_in(dir.path()).await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/fetch-emails")
            .header("content-type", "application/json")
            .header("x-email-address", "other@example.com")
            .body(Body::from(
                json!({ "startDate": "2025-09-15", "endDate": "2025-09-22" }).to_string(),
            ))
            .unwrap();
        let (status, body) = send_request(&state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["insertedCount"], 5);
    }

    #[tokio::test]
    async fn test_fetch_range_validation() {
        let dir = tempfile::tempdir().unwrap();
        configure(dir.path(), "echo 1\n", "", 30);
        let state = state_in(dir.path()).await;

        let (status, _) = fetch(&state, Some(json!({ "startDate": "2025-09-15" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = fetch(
            &state,
            Some(json!({ "startDate": "2025-09-22", "endDate": "2025-09-15" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = fetch(
            &state,
            Some(json!({ "startDate": "15/09/2025", "endDate": "2025-09-22" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_fetch_failure_includes_stderr() {
        let dir = tempfile::tempdir().unwrap();
        configure(dir.path(), "echo 'login rejected' >&2; exit 2\n", "", 30);
        let state = state_in(dir.path()).await;

        let (status, body) = fetch(&state, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["details"].as_str().unwrap().contains("login rejected"));
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_408() {
        let dir = tempfile::tempdir().unwrap();
        configure(dir.path(), "exec sleep 30\n", "", 1);
        let state = state_in(dir.path()).await;

        let (status, body) = fetch(&state, None).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert!(body["error"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_fetch_without_mailbox() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(dir.path()).await;
        state.mailbox_env = |_| None;

        let request = Request::builder()
            .method("POST")
            .uri("/api/fetch-emails")
            .header("x-email-address", "me@example.com")
            .header("x-email-password", "")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send_request(&state, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn test_fetched_emails_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        configure(
            dir.path(),
            concat!(
                "echo '{\"imap_id\":\"31\",\"subject\":\"Interview invitation\",",
                "\"sender\":\"hr@acme.example\",\"send_date\":\"2025-09-01 10:00:00\"}'\n",
                "echo '{\"imap_id\":\"32\",\"subject\":\"Offer\",",
                "\"sender\":\"hr@acme.example\",\"send_date\":\"2025-09-03 10:00:00\"}'\n",
                "echo '处理了 2 封邮件，新增 2 封'\n",
            ),
            "",
            30,
        );
        let state = state_in(dir.path()).await;

        let (status, body) = fetch(&state, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["insertedCount"], 2);

        let (_, listed) = send(&state, "GET", "/api/emails", None).await;
        let subjects: Vec<_> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|email| email["subject"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(subjects, ["Offer", "Interview invitation"]);

        let (status, body) = fetch(&state, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["insertedCount"], 0);
        assert_eq!(body["processedCount"], 2);
    }

    #[tokio::test]
    async fn test_realtime_body() {
        let dir = tempfile::tempdir().unwrap();
        configure(dir.path(), "", "printf 'Body of %s' \"$1\"\n", 30);
        let state = state_in(dir.path()).await;
        let emails = state.stores.emails.clone().unwrap();
        emails
            .insert_if_absent(&NewEmail::new("With id", "a@x", "b@x", "2025-09-01").with_imap_id("4711"))
            .await
            .unwrap();
        emails
            .insert_if_absent(&NewEmail::new("Without id", "a@x", "b@x", "2025-09-02"))
            .await
            .unwrap();
        let listed = emails.list().await.unwrap();
        let without = listed[0].id;
        let with = listed[1].id;

        let (status, body) =
            send(&state, "GET", &format!("/api/emails/{with}/body/realtime"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["body"], "Body of 4711");

        let (status, body) =
            send(&state, "GET", &format!("/api/emails/{without}/body/realtime"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "IMAP ID not found for this email");

        let (status, _) = send(&state, "GET", "/api/emails/999/body/realtime", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
