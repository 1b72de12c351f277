//! Error types for the auth service.

use crate::directory::StoreError;
use crate::notify::DeliveryError;
use crate::token::TokenError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use code_cache::CacheError;
use serde::Serialize;
use thiserror::Error;

/// Outcomes of the authentication workflow.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user not found")]
    NotFound,

    #[error("user is already registered")]
    AlreadyRegistered,

    #[error("registration is not finished")]
    RegistrationNotFinished,

    #[error("wrong code provided")]
    WrongCodeProvided,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => AuthError::NotFound,
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<CacheError> for AuthError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::NotFound => AuthError::WrongCodeProvided,
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        AuthError::Internal(e.to_string())
    }
}

impl From<DeliveryError> for AuthError {
    fn from(e: DeliveryError) -> Self {
        AuthError::Internal(e.to_string())
    }
}

/// Errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("not implemented")]
    NotImplemented,
}

/// Full error text attached to a failed response for the request logger.
/// The client body may be sanitized; this never is.
#[derive(Debug, Clone)]
pub struct FailureDetail(pub String);

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(AuthError::NotFound) => StatusCode::BAD_REQUEST,
            ApiError::Auth(AuthError::AlreadyRegistered) => StatusCode::CONFLICT,
            ApiError::Auth(AuthError::RegistrationNotFinished) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Auth(AuthError::WrongCodeProvided) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Auth(AuthError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.to_string();

        let message = if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
            "internal server error".to_string()
        } else {
            detail.clone()
        };

        let mut response = (status, Json(ErrorResponse { message })).into_response();
        response.extensions_mut().insert(FailureDetail(detail));
        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::InvalidRequest(e.body_text())
    }
}
