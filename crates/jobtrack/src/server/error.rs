//! Mapping of failures to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use jobtrack_core::SyncError;
use serde_json::json;
use tracing::error;

/// A failed request, rendered as `{ "error": ..., "details"?: ... }`.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed input (400).
    BadRequest(String),
    /// Unknown record (404).
    NotFound(String),
    /// Uniqueness collision (409).
    Conflict(String),
    /// A store could not be opened at startup (503).
    Unavailable(&'static str),
    /// The external task was terminated (408).
    Timeout {
        /// Summary.
        message: String,
        /// Captured stderr.
        details: Option<String>,
    },
    /// Anything else (500).
    Internal {
        /// Summary.
        message: String,
        /// Captured stderr or the underlying error.
        details: Option<String>,
    },
}

impl ApiError {
    /// A 400 with `message`.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, details) = match self {
            Self::BadRequest(message) | Self::NotFound(message) | Self::Conflict(message) => {
                (message, None)
            }
            Self::Unavailable(store) => (format!("{store} is unavailable"), None),
            Self::Timeout { message, details } | Self::Internal { message, details } => {
                (message, details)
            }
        };

        let body = match details {
            Some(details) => json!({ "error": message, "details": details }),
            None => json!({ "error": message }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<jobtrack_core::Error> for ApiError {
    fn from(err: jobtrack_core::Error) -> Self {
        use jobtrack_core::Error;
        match err {
            Error::Validation(message) => Self::BadRequest(message),
            Error::NotFound(_) => Self::NotFound(err.to_string()),
            Error::Duplicate(_) => Self::Conflict(err.to_string()),
            Error::Database(_) | Error::Serde(_) | Error::Io(_) | Error::Config(_) => {
                error!(error = %err, "Request failed");
                Self::Internal {
                    message: "Internal storage error".to_string(),
                    details: Some(err.to_string()),
                }
            }
        }
    }
}

impl From<jobtrack_fetch::Error> for ApiError {
    fn from(err: jobtrack_fetch::Error) -> Self {
        use jobtrack_fetch::Error;
        match err {
            Error::InvalidDate { .. } | Error::InvertedRange { .. } => {
                Self::BadRequest(err.to_string())
            }
            Error::Launch { .. } | Error::Io(_) => {
                error!(error = %err, "Could not run task");
                Self::Internal {
                    message: "Could not start the fetch task".to_string(),
                    details: Some(err.to_string()),
                }
            }
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        let details = err.diagnostics().map(str::to_string);
        match err {
            SyncError::MailboxNotConfigured => Self::BadRequest(err.to_string()),
            SyncError::TimedOut { .. } => Self::Timeout {
                message: err.to_string(),
                details,
            },
            SyncError::Failed { .. } => Self::Internal {
                message: err.to_string(),
                details,
            },
            SyncError::Launch(inner) => inner.into(),
            SyncError::Store(inner) => inner.into(),
        }
    }
}
