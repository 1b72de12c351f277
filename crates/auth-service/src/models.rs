//! Records exchanged between the workflow and its stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user known to the directory, registered or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRecord {
    pub uid: Uuid,
    pub phonenumber: String,
    pub is_registered: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An issued refresh token. Sessions are only ever appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub user_uid: Uuid,
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Access and refresh tokens returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Partial update of a [`UserRecord`].
///
/// Each field is a column of the `users` table; `None` leaves the column
/// untouched. `updated_at` is refreshed by every non-empty update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub is_registered: Option<bool>,
}

impl UserUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(mut self, value: bool) -> Self {
        self.is_registered = Some(value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.is_registered.is_none()
    }

    /// Apply the set fields to an in-memory record.
    pub fn apply(&self, record: &mut UserRecord, now: DateTime<Utc>) {
        if let Some(is_registered) = self.is_registered {
            record.is_registered = is_registered;
        }
        record.updated_at = now;
    }
}
