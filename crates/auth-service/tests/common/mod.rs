//! Helpers shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use auth_service::{
    notify::{CodeNotifier, DeliveryError},
    token::JwtIssuer,
    UserRecord,
};
use code_cache::CodePurpose;
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const PHONE: &str = "9009009090";

/// Remembers the last code delivered per purpose and user.
#[derive(Clone, Default)]
pub struct CapturingNotifier {
    codes: Arc<Mutex<HashMap<(CodePurpose, Uuid), String>>>,
    deliveries: Arc<Mutex<usize>>,
}

impl CapturingNotifier {
    pub fn code(&self, purpose: CodePurpose, uid: Uuid) -> String {
        self.codes.lock().unwrap()[&(purpose, uid)].clone()
    }

    pub fn deliveries(&self) -> usize {
        *self.deliveries.lock().unwrap()
    }
}

#[async_trait]
impl CodeNotifier for CapturingNotifier {
    async fn deliver(
        &self,
        user: &UserRecord,
        purpose: CodePurpose,
        code: &str,
    ) -> Result<(), DeliveryError> {
        self.codes
            .lock()
            .unwrap()
            .insert((purpose, user.uid), code.to_string());
        *self.deliveries.lock().unwrap() += 1;
        Ok(())
    }
}

pub fn issuer() -> JwtIssuer {
    JwtIssuer::new(
        &SecretString::new("test_secret_key".into()),
        Duration::from_secs(600),
        Duration::from_secs(3600),
    )
    .unwrap()
}

/// A code of the same width that differs from `code`.
pub fn wrong_code(code: &str) -> String {
    let value: u32 = code.parse().unwrap();
    let modulus = 10u32.pow(code.len() as u32);
    format!("{:0width$}", (value + 1) % modulus, width = code.len())
}
