//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use tasty_core::logging;

pub const NOT_FOUND_MESSAGE: &str = "the requested resource could not be found";
pub const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

/// Error returned by handlers, rendered as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// `detail` is logged and only sent to the client when `expose` is set.
    Internal { detail: String, expose: bool },
}

impl ApiError {
    /// Map a core error, exposing internal detail only in debug mode.
    pub fn from_core(err: tasty_core::Error, debug_enabled: bool) -> Self {
        match err {
            tasty_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            tasty_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal {
                detail: other.to_string(),
                expose: debug_enabled,
            },
        }
    }
}

impl From<tasty_core::Error> for ApiError {
    fn from(err: tasty_core::Error) -> Self {
        ApiError::from_core(err, false)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => {
                tracing::debug!(subsystem = logging::API, error = %msg, "Resource not found");
                (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE.to_string())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal { detail, expose } => {
                tracing::error!(subsystem = logging::API, error = %detail, "Request failed");
                let message = if expose {
                    detail
                } else {
                    SERVER_ERROR_MESSAGE.to_string()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
