//! Postgres-backed directory and session log.

use super::{SessionStore, StoreError, UserDirectory};
use crate::models::{Session, UserRecord, UserUpdate};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const USER_COLUMNS: &str = "uid, phonenumber, is_registered, created_at, updated_at";

/// Open a connection pool and verify it with a round trip.
pub async fn connect_pool(
    url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(url)
        .await?;

    info!(max_connections, "Connected to Postgres");
    Ok(pool)
}

/// Apply the bundled schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// User directory over the `users` table.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    #[instrument(skip(self))]
    async fn insert(&self, phonenumber: &str) -> Result<UserRecord, StoreError> {
        let query = format!(
            "INSERT INTO users (phonenumber) VALUES ($1) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRecord>(&query)
            .bind(phonenumber)
            .fetch_one(&self.pool)
            .await
            .map_err(Into::into)
    }

    #[instrument(skip(self))]
    async fn select_by_phonenumber(&self, phonenumber: &str) -> Result<UserRecord, StoreError> {
        let query = format!("SELECT {} FROM users WHERE phonenumber = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRecord>(&query)
            .bind(phonenumber)
            .fetch_one(&self.pool)
            .await
            .map_err(Into::into)
    }

    #[instrument(skip(self))]
    async fn select_by_uid(&self, uid: Uuid) -> Result<UserRecord, StoreError> {
        let query = format!("SELECT {} FROM users WHERE uid = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRecord>(&query)
            .bind(uid)
            .fetch_one(&self.pool)
            .await
            .map_err(Into::into)
    }

    #[instrument(skip(self))]
    async fn update_fields(&self, uid: Uuid, update: UserUpdate) -> Result<(), StoreError> {
        if update.is_empty() {
            return Err(StoreError::EmptyUpdate);
        }

        // Column names are fixed here; only values are bound.
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = NOW()");
        if let Some(is_registered) = update.is_registered {
            builder.push(", is_registered = ").push_bind(is_registered);
        }
        builder.push(" WHERE uid = ").push_bind(uid);

        let result = builder.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_unregistered(&self, older_than: Duration) -> Result<u64, StoreError> {
        // Same clock that stamps created_at.
        let result = sqlx::query(
            "DELETE FROM users \
             WHERE is_registered = false AND created_at < NOW() - make_interval(secs => $1)",
        )
        .bind(older_than.as_secs_f64())
        .execute(&self.pool)
        .await?;

        debug!(rows = result.rows_affected(), "Deleted unregistered users");
        Ok(result.rows_affected())
    }
}

/// Session log over the `sessions` table.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    #[instrument(skip(self, session), fields(user_uid = %session.user_uid))]
    async fn insert(&self, session: &Session) -> Result<Session, StoreError> {
        sqlx::query_as::<_, Session>(
            "INSERT INTO sessions (user_uid, token, issued_at, expires_at)
             VALUES ($1, $2, $3, $4)
             RETURNING user_uid, token, issued_at, expires_at",
        )
        .bind(session.user_uid)
        .bind(&session.token)
        .bind(session.issued_at)
        .bind(session.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }
}
