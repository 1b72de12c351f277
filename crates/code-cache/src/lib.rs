//! Ephemeral storage for pending one-time codes.
//!
//! Codes are namespaced by purpose (registration or login) and keyed by user
//! id. Every entry carries a TTL; at most one live code exists per
//! `(purpose, uid)` and a new `set` overwrites the previous one.

mod error;
mod memory;
mod redis_store;
mod types;

pub use error::CacheError;
pub use memory::MemoryCodeCache;
pub use redis_store::RedisCodeCache;
pub use types::CodePurpose;

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

/// Capability interface over a TTL-backed code store.
#[async_trait]
pub trait OneTimeCodeCache: Send + Sync {
    /// Store `code` for `(purpose, uid)`, replacing any live code.
    async fn set(
        &self,
        purpose: CodePurpose,
        uid: Uuid,
        code: &str,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Fetch the live code, or [`CacheError::NotFound`] if absent or expired.
    async fn get(&self, purpose: CodePurpose, uid: Uuid) -> Result<String, CacheError>;

    /// Remove the code. Removing a missing code is not an error.
    async fn delete(&self, purpose: CodePurpose, uid: Uuid) -> Result<(), CacheError>;
}
