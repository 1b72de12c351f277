//! Code purpose namespaces.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What a pending code proves once it is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodePurpose {
    Register,
    Login,
}

impl CodePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodePurpose::Register => "register",
            CodePurpose::Login => "login",
        }
    }

    /// Cache key for the code of `uid` in this namespace, e.g. `login:<uid>`.
    pub fn key(&self, uid: Uuid) -> String {
        format!("{}:{}", self.as_str(), uid)
    }
}

impl fmt::Display for CodePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
