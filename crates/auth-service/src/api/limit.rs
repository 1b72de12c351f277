//! Per-phonenumber throttling of code delivery.

use crate::error::ApiError;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::{num::NonZeroU32, sync::Arc};
use tracing::warn;

/// Tracked phonenumbers before idle entries are dropped.
const MAX_TRACKED_KEYS: usize = 10_000;

/// Limits how often a code can be requested for one phonenumber.
///
/// Applied to register and login, the two requests that generate and deliver
/// a code. Confirmations are not throttled here.
#[derive(Clone)]
pub struct CodeRateLimiter {
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
}

impl CodeRateLimiter {
    /// Allow `per_minute` code requests per phonenumber; zero is treated as one.
    pub fn new(per_minute: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN));

        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Create a permissive limiter for testing.
    pub fn permissive() -> Self {
        Self::new(100_000)
    }

    /// Consume one request for `phonenumber`.
    pub fn check(&self, phonenumber: &str) -> Result<(), ApiError> {
        let result = self.limiter.check_key(&phonenumber.to_owned());

        if self.limiter.len() > MAX_TRACKED_KEYS {
            self.limiter.retain_recent();
        }

        result.map_err(|_| {
            warn!(phonenumber, "Code request rate limit exceeded");
            ApiError::RateLimitExceeded
        })
    }
}
