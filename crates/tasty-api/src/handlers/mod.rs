//! HTTP handlers.

pub mod recipes;

use axum::extract::State;

use crate::error::ApiError;
use crate::AppState;

/// Liveness probe: answers `pong` when storage is reachable.
pub async fn ping(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    state.recipes.ping().await.map_err(|e| state.error(e))?;
    Ok("pong")
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("no route matches the request".to_string())
}
