//! HTTP front door.

mod config;
mod deliveries;
mod emails;
mod error;
mod fetch;
mod interviews;
mod pages;
mod state;

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::info;

pub use error::ApiError;
pub use state::{AppState, MailboxOverrides, Stores};

const ALLOWED_HEADERS: &str = "Content-Type, X-Email-Address, X-Email-Password, X-Imap-Server";

/// Builds the router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/config", get(config::show).post(config::update))
        .route("/api/interviews", get(interviews::list).post(interviews::replace))
        .route("/api/emails", get(emails::list))
        .route("/api/emails/search", get(emails::search))
        .route("/api/emails/import", post(emails::import))
        .route("/api/emails/{id}", delete(emails::remove))
        .route("/api/emails/{id}/delivered", put(emails::set_delivered))
        .route("/api/emails/{id}/body/realtime", get(fetch::realtime_body))
        .route("/api/fetch-emails", post(fetch::fetch_emails))
        .route("/api/deliveries", get(deliveries::list).post(deliveries::create))
        .route(
            "/api/deliveries/{id}",
            put(deliveries::update).delete(deliveries::remove),
        )
        .route("/api/exit", post(exit))
        .route("/", get(pages::index))
        .route("/schedule", get(pages::schedule))
        .route("/emails", get(pages::emails))
        .route("/deliveries", get(pages::deliveries))
        .route("/config", get(pages::config))
        .fallback(pages::asset)
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Serves until `POST /api/exit` or Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server is running on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            tokio::select! {
                () = shutdown.notified() => info!("Shutdown requested"),
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }
        })
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response
}

async fn exit(State(state): State<AppState>) -> Json<Value> {
    info!("Exit requested over HTTP");
    state.shutdown.notify_one();
    Json(json!({ "message": "Server is shutting down" }))
}

/// Decodes a JSON request body; malformed JSON is a 400.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))
}

/// Parses a decimal record id from a path segment.
fn parse_id(raw: &str, what: &str) -> Result<i64, ApiError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::bad_request(format!("Invalid {what} ID")));
    }
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid {what} ID")))
}

fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}
