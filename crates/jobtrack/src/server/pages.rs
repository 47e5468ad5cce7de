//! HTML pages and other files under the public directory.

use std::path::{Component, Path, PathBuf};

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Uri};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::{ApiError, AppState};

pub async fn index(State(state): State<AppState>) -> Result<Response, ApiError> {
    serve_file(state.page("index.html")).await
}

pub async fn schedule(State(state): State<AppState>) -> Result<Response, ApiError> {
    serve_file(state.page("schedule.html")).await
}

pub async fn emails(State(state): State<AppState>) -> Result<Response, ApiError> {
    serve_file(state.page("emails.html")).await
}

pub async fn deliveries(State(state): State<AppState>) -> Result<Response, ApiError> {
    serve_file(state.page("deliveries.html")).await
}

pub async fn config(State(state): State<AppState>) -> Result<Response, ApiError> {
    serve_file(state.page("config.html")).await
}

/// Any other `GET` is looked up under the public directory.
pub async fn asset(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
) -> Result<Response, ApiError> {
    if method != Method::GET {
        return Err(ApiError::NotFound(format!("Cannot {method} {}", uri.path())));
    }
    let path = resolve(state.public_root(), uri.path())
        .ok_or_else(|| ApiError::NotFound(format!("Cannot GET {}", uri.path())))?;
    serve_file(path).await
}

/// Maps a request path onto `root`, refusing anything that would leave it.
fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = Path::new(request_path.trim_start_matches('/'));
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (resolved != root).then_some(resolved)
}

async fn serve_file(path: PathBuf) -> Result<Response, ApiError> {
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(CONTENT_TYPE, content_type(&path))], bytes).into_response()),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Static file not served");
            Err(ApiError::NotFound("Page not found".to_string()))
        }
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
