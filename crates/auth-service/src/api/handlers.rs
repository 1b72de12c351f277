//! HTTP request handlers.

use super::types::{
    parse_uid, validate_code, validate_phonenumber, ConfirmRequest, HealthResponse,
    LoginRequest, RegisterRequest,
};
use super::AppState;
use crate::error::ApiError;
use crate::models::{TokenPair, UserRecord};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use tracing::info;

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Create an unregistered user and issue a registration code.
pub async fn register(
    State(state): State<AppState>,
    request: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserRecord>), ApiError> {
    let Json(request) = request?;
    let phonenumber = validate_phonenumber(&request.phonenumber)?;
    state.code_limiter.check(phonenumber)?;

    let user = state.workflow.register(phonenumber).await?;
    info!(uid = %user.uid, "Registration started");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Confirm a registration code.
pub async fn confirm_register(
    State(state): State<AppState>,
    request: Result<Json<ConfirmRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let Json(request) = request?;
    let uid = parse_uid(&request.uid)?;
    let code = validate_code(&request.code)?;

    let tokens = state.workflow.confirm_register(uid, code).await?;
    Ok(Json(tokens))
}

/// Issue a login code to a registered user.
pub async fn login(
    State(state): State<AppState>,
    request: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = request?;
    let phonenumber = validate_phonenumber(&request.phonenumber)?;
    state.code_limiter.check(phonenumber)?;

    state.workflow.login(phonenumber).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Confirm a login code.
pub async fn confirm_login(
    State(state): State<AppState>,
    request: Result<Json<ConfirmRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let Json(request) = request?;
    let uid = parse_uid(&request.uid)?;
    let code = validate_code(&request.code)?;

    let tokens = state.workflow.confirm_login(uid, code).await?;
    Ok(Json(tokens))
}

pub async fn refresh() -> ApiError {
    ApiError::NotImplemented
}

pub async fn revoke() -> ApiError {
    ApiError::NotImplemented
}
