//! Persistent user directory and session log.
//!
//! Both stores are capability interfaces injected into the workflow. Backends
//! translate their own failures (unique violations, missing rows) into
//! [`StoreError`] so callers never see driver-specific errors.

mod memory;
mod postgres;

pub use memory::{MemorySessionStore, MemoryUserDirectory};
pub use postgres::{connect_pool, run_migrations, PgSessionStore, PgUserDirectory};

use crate::models::{Session, UserRecord, UserUpdate};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Directory and session store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,

    #[error("phonenumber already exists")]
    AlreadyExists,

    #[error("update has no fields set")]
    EmptyUpdate,

    #[error("storage error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::AlreadyExists,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        StoreError::Backend(format!("migration failed: {}", e))
    }
}

/// Users keyed by phonenumber and uid.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Create an unregistered user. Fails with [`StoreError::AlreadyExists`]
    /// if the phonenumber is taken.
    async fn insert(&self, phonenumber: &str) -> Result<UserRecord, StoreError>;

    async fn select_by_phonenumber(&self, phonenumber: &str) -> Result<UserRecord, StoreError>;

    async fn select_by_uid(&self, uid: Uuid) -> Result<UserRecord, StoreError>;

    /// Update the fields set in `update`. Fails with [`StoreError::NotFound`]
    /// when no row matched.
    async fn update_fields(&self, uid: Uuid, update: UserUpdate) -> Result<(), StoreError>;

    /// Delete unregistered users created more than `older_than` ago.
    /// Returns the number of deleted rows.
    async fn delete_unregistered(&self, older_than: Duration) -> Result<u64, StoreError>;
}

/// Append-only log of issued refresh tokens.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &Session) -> Result<Session, StoreError>;
}

