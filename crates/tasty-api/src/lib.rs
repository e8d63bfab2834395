//! tasty-api - HTTP boundary for tasty-byte
//!
//! The router only depends on [`RecipeRepository`], so it can be served over
//! PostgreSQL in production and over the in-memory backend in tests.

pub mod config;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use tasty_core::RecipeRepository;

use crate::error::ApiError;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Clone)]
pub struct AppState {
    pub recipes: Arc<dyn RecipeRepository>,
    /// Send internal error detail to clients.
    pub debug_enabled: bool,
}

impl AppState {
    pub fn new(recipes: impl RecipeRepository + 'static, debug_enabled: bool) -> Self {
        Self {
            recipes: Arc::new(recipes),
            debug_enabled,
        }
    }

    /// Map a core error into a response error honoring debug mode.
    pub fn error(&self, err: tasty_core::Error) -> ApiError {
        ApiError::from_core(err, self.debug_enabled)
    }
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the application router with its middleware stack.
pub fn app(state: AppState, allowed_origins: Vec<HeaderValue>) -> Router {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route(
            "/v1/recipes",
            get(handlers::recipes::list_recipes).post(handlers::recipes::create_recipe),
        )
        .route(
            "/v1/recipes/:id",
            get(handlers::recipes::show_recipe)
                .put(handlers::recipes::update_recipe)
                .delete(handlers::recipes::delete_recipe),
        )
        .fallback(handlers::not_found)
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
                .max_age(std::time::Duration::from_secs(3600)),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
