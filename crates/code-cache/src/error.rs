//! Code cache errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    /// No live code for the requested (purpose, uid) pair.
    #[error("code does not exist")]
    NotFound,

    #[error("cache backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::Backend(e.to_string())
    }
}
