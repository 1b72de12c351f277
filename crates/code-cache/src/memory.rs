//! In-memory code cache with TTL expiration.

use crate::error::CacheError;
use crate::types::CodePurpose;
use crate::OneTimeCodeCache;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, instrument};
use uuid::Uuid;

type Entries = RwLock<HashMap<String, CodeEntry>>;

/// Pending code with expiration tracking.
struct CodeEntry {
    code: String,
    expires_at: Instant,
}

/// In-memory code cache.
///
/// Expired entries are invisible to readers immediately and are swept from
/// memory by a background task. The task stops once the last handle to the
/// cache is dropped.
#[derive(Clone)]
pub struct MemoryCodeCache {
    entries: Arc<Entries>,
}

impl MemoryCodeCache {
    /// Create a new cache, sweeping expired codes every minute.
    pub fn new() -> Self {
        Self::with_cleanup_interval(Duration::from_secs(60))
    }

    /// Create a new cache with a custom sweep interval.
    pub fn with_cleanup_interval(interval: Duration) -> Self {
        let entries: Arc<Entries> = Arc::new(RwLock::new(HashMap::new()));

        tokio::spawn(cleanup_loop(Arc::downgrade(&entries), interval));

        info!("In-memory code cache initialized (cleanup_interval={:?})", interval);

        Self { entries }
    }

    /// Number of live (unexpired) codes.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

async fn cleanup_loop(entries: Weak<Entries>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;

        let Some(entries) = entries.upgrade() else {
            break;
        };

        let now = Instant::now();
        let mut entries = entries.write().await;
        let before_count = entries.len();

        entries.retain(|_, entry| entry.expires_at > now);

        let removed = before_count - entries.len();
        if removed > 0 {
            debug!("Cleaned up {} expired codes", removed);
        }
    }
}

#[async_trait]
impl OneTimeCodeCache for MemoryCodeCache {
    #[instrument(skip(self, code))]
    async fn set(
        &self,
        purpose: CodePurpose,
        uid: Uuid,
        code: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let entry = CodeEntry {
            code: code.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(purpose.key(uid), entry);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, purpose: CodePurpose, uid: Uuid) -> Result<String, CacheError> {
        let entries = self.entries.read().await;
        let now = Instant::now();

        entries
            .get(&purpose.key(uid))
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.code.clone())
            .ok_or(CacheError::NotFound)
    }

    #[instrument(skip(self))]
    async fn delete(&self, purpose: CodePurpose, uid: Uuid) -> Result<(), CacheError> {
        if self.entries.write().await.remove(&purpose.key(uid)).is_some() {
            debug!("Deleted {} code for {}", purpose, uid);
        }
        Ok(())
    }
}
