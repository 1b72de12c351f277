//! API request and response types.

use crate::code::{MAX_CODE_LENGTH, MIN_CODE_LENGTH};
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use uuid::{Uuid, Version};

/// Digits in a phone number.
pub const PHONENUMBER_LENGTH: usize = 10;

/// Request to register a phone number.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub phonenumber: String,
}

/// Request to log in with a registered phone number.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phonenumber: String,
}

/// Request to confirm a registration or login with a code.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub uid: String,
    pub code: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub fn validate_phonenumber(phonenumber: &str) -> Result<&str, ApiError> {
    if phonenumber.len() != PHONENUMBER_LENGTH || !is_digits(phonenumber) {
        return Err(ApiError::InvalidRequest(format!(
            "phonenumber must be {} digits",
            PHONENUMBER_LENGTH
        )));
    }
    Ok(phonenumber)
}

/// Parse a version 4 UUID.
pub fn parse_uid(uid: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(uid)
        .ok()
        .filter(|uid| uid.get_version() == Some(Version::Random))
        .ok_or_else(|| ApiError::InvalidRequest("uid must be a UUID".into()))
}

pub fn validate_code(code: &str) -> Result<&str, ApiError> {
    if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&code.len()) || !is_digits(code) {
        return Err(ApiError::InvalidRequest(format!(
            "code must be {} to {} digits",
            MIN_CODE_LENGTH, MAX_CODE_LENGTH
        )));
    }
    Ok(code)
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}
