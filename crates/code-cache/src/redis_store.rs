//! Redis-backed code cache.
//!
//! Each code is a plain string value under `<purpose>:<uid>` with a native
//! Redis expiry, so abandoned codes disappear without any sweeping.

use crate::error::CacheError;
use crate::types::CodePurpose;
use crate::OneTimeCodeCache;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Code cache backed by a shared, auto-reconnecting Redis connection.
#[derive(Clone)]
pub struct RedisCodeCache {
    conn: ConnectionManager,
}

impl RedisCodeCache {
    /// Connect to Redis at `url` (e.g. `redis://:password@auth-redis:6379`).
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to Redis code cache");
        Ok(Self { conn })
    }

    /// Wrap an existing connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl OneTimeCodeCache for RedisCodeCache {
    #[instrument(skip(self, code))]
    async fn set(
        &self,
        purpose: CodePurpose,
        uid: Uuid,
        code: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        // SETEX rejects a zero expiry.
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(purpose.key(uid), code, seconds)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, purpose: CodePurpose, uid: Uuid) -> Result<String, CacheError> {
        let mut conn = self.conn.clone();
        let code: Option<String> = conn.get(purpose.key(uid)).await?;
        code.ok_or(CacheError::NotFound)
    }

    #[instrument(skip(self))]
    async fn delete(&self, purpose: CodePurpose, uid: Uuid) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(purpose.key(uid)).await?;
        Ok(())
    }
}
