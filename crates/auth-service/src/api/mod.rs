//! HTTP API for the auth service.

mod handlers;
mod limit;
mod middleware;
mod types;

pub use handlers::*;
pub use limit::CodeRateLimiter;
pub use middleware::logging_middleware;
pub use types::*;

use crate::workflow::AuthWorkflow;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default code requests per phonenumber per minute.
pub const DEFAULT_CODES_PER_MINUTE: u32 = 3;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<AuthWorkflow>,
    pub code_limiter: CodeRateLimiter,
}

impl AppState {
    pub fn new(workflow: AuthWorkflow) -> Self {
        Self {
            workflow: Arc::new(workflow),
            code_limiter: CodeRateLimiter::new(DEFAULT_CODES_PER_MINUTE),
        }
    }

    pub fn with_code_limiter(mut self, limiter: CodeRateLimiter) -> Self {
        self.code_limiter = limiter;
        self
    }
}

/// Create the API router with the default request deadline.
pub fn create_router(state: AppState) -> Router {
    create_router_with(state, DEFAULT_REQUEST_TIMEOUT)
}

/// Create the API router with a custom request deadline.
pub fn create_router_with(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/register/", post(handlers::register))
        .route("/api/register/confirm/", post(handlers::confirm_register))
        .route("/api/login/", post(handlers::login))
        .route("/api/login/confirm/", post(handlers::confirm_login))
        .route("/api/refresh/", post(handlers::refresh))
        .route("/api/revoke/", post(handlers::revoke))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
