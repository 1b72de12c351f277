//! In-memory directory and session log.

use super::{SessionStore, StoreError, UserDirectory};
use crate::clock::{Clock, SystemClock};
use crate::models::{Session, UserRecord, UserUpdate};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// In-memory user directory.
#[derive(Clone)]
pub struct MemoryUserDirectory {
    /// User records indexed by uid
    users: Arc<RwLock<HashMap<Uuid, UserRecord>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Stamp records and compute retention cutoffs with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Number of records, registered or not.
    pub async fn count(&self) -> usize {
        self.users.read().await.len()
    }

    /// Number of records with the given phonenumber.
    pub async fn count_by_phonenumber(&self, phonenumber: &str) -> usize {
        self.users
            .read()
            .await
            .values()
            .filter(|u| u.phonenumber == phonenumber)
            .count()
    }
}

impl Default for MemoryUserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn insert(&self, phonenumber: &str) -> Result<UserRecord, StoreError> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.phonenumber == phonenumber) {
            return Err(StoreError::AlreadyExists);
        }

        let now = self.clock.now();
        let record = UserRecord {
            uid: Uuid::new_v4(),
            phonenumber: phonenumber.to_string(),
            is_registered: false,
            created_at: now,
            updated_at: now,
        };
        users.insert(record.uid, record.clone());

        Ok(record)
    }

    async fn select_by_phonenumber(&self, phonenumber: &str) -> Result<UserRecord, StoreError> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.phonenumber == phonenumber)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn select_by_uid(&self, uid: Uuid) -> Result<UserRecord, StoreError> {
        self.users
            .read()
            .await
            .get(&uid)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_fields(&self, uid: Uuid, update: UserUpdate) -> Result<(), StoreError> {
        if update.is_empty() {
            return Err(StoreError::EmptyUpdate);
        }

        let mut users = self.users.write().await;
        let record = users.get_mut(&uid).ok_or(StoreError::NotFound)?;
        update.apply(record, self.clock.now());

        Ok(())
    }

    async fn delete_unregistered(&self, older_than: Duration) -> Result<u64, StoreError> {
        let cutoff = cutoff(self.clock.now(), older_than)?;

        let mut users = self.users.write().await;
        let before_count = users.len();
        users.retain(|_, u| u.is_registered || u.created_at >= cutoff);

        let removed = (before_count - users.len()) as u64;
        if removed > 0 {
            debug!("Removed {} stale registrations", removed);
        }
        Ok(removed)
    }
}

/// In-memory session log.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<Vec<Session>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions issued to `uid`, oldest first.
    pub async fn for_user(&self, uid: Uuid) -> Vec<Session> {
        self.sessions
            .read()
            .await
            .iter()
            .filter(|s| s.user_uid == uid)
            .cloned()
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: &Session) -> Result<Session, StoreError> {
        self.sessions.write().await.push(session.clone());
        Ok(session.clone())
    }
}

/// Oldest `created_at` that survives a sweep at `now`.
fn cutoff(
    now: chrono::DateTime<chrono::Utc>,
    older_than: Duration,
) -> Result<chrono::DateTime<chrono::Utc>, StoreError> {
    let delta = chrono::Duration::from_std(older_than)
        .map_err(|e| StoreError::Backend(format!("invalid retention window: {}", e)))?;
    Ok(now - delta)
}
