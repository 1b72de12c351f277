//! Access/refresh token issuance.

use crate::models::TokenPair;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("invalid token lifetime: {0}")]
    Lifetime(String),
}

/// Which half of a token pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Identity claims carried by the access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub uid: Uuid,
    pub phonenumber: String,
}

/// Claims carried by the refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub uid: Uuid,
}

/// Payload as encoded in a signed token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims<C> {
    #[serde(flatten)]
    pub data: C,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
    /// Unique token id, so two tokens minted in the same second differ.
    pub jti: Uuid,
}

/// Result of [`TokenIssuer::issue`].
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_issued_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl IssuedTokens {
    pub fn pair(&self) -> TokenPair {
        TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

/// Signs access/refresh token pairs.
pub trait TokenIssuer: Send + Sync {
    fn issue(
        &self,
        access: &AccessClaims,
        refresh: &RefreshClaims,
    ) -> Result<IssuedTokens, TokenError>;
}

/// HS256 JWT issuer with a shared secret.
#[derive(Clone)]
pub struct JwtIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
}

impl JwtIssuer {
    pub fn new(
        secret: &SecretString,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<Self, TokenError> {
        let secret = secret.expose_secret().as_bytes();
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl: to_chrono(access_ttl)?,
            refresh_ttl: to_chrono(refresh_ttl)?,
        })
    }

    fn sign<C: Serialize>(
        &self,
        data: &C,
        typ: TokenKind,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        let expires_at = now + ttl;
        let claims = Claims {
            data,
            typ,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok((token, expires_at))
    }

    fn verify<C: DeserializeOwned>(
        &self,
        token: &str,
        expected: TokenKind,
    ) -> Result<Claims<C>, TokenError> {
        let claims =
            decode::<Claims<C>>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
                .map(|data| data.claims)
                .map_err(|e| TokenError::Invalid(e.to_string()))?;

        if claims.typ != expected {
            return Err(TokenError::Invalid(format!(
                "expected {:?} token, got {:?}",
                expected, claims.typ
            )));
        }
        Ok(claims)
    }

    /// Verify signature, expiry and kind of an access token.
    pub fn verify_access(&self, token: &str) -> Result<Claims<AccessClaims>, TokenError> {
        self.verify(token, TokenKind::Access)
    }

    /// Verify signature, expiry and kind of a refresh token.
    pub fn verify_refresh(&self, token: &str) -> Result<Claims<RefreshClaims>, TokenError> {
        self.verify(token, TokenKind::Refresh)
    }
}

impl TokenIssuer for JwtIssuer {
    fn issue(
        &self,
        access: &AccessClaims,
        refresh: &RefreshClaims,
    ) -> Result<IssuedTokens, TokenError> {
        // Second precision, matching the iat/exp encoded in the token.
        let now = Utc
            .timestamp_opt(Utc::now().timestamp(), 0)
            .single()
            .ok_or_else(|| TokenError::Signing("clock out of range".into()))?;

        let (access_token, _) = self.sign(access, TokenKind::Access, now, self.access_ttl)?;
        let (refresh_token, refresh_expires_at) =
            self.sign(refresh, TokenKind::Refresh, now, self.refresh_ttl)?;

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            refresh_issued_at: now,
            refresh_expires_at,
        })
    }
}

fn to_chrono(ttl: Duration) -> Result<chrono::Duration, TokenError> {
    chrono::Duration::from_std(ttl).map_err(|e| TokenError::Lifetime(e.to_string()))
}
