//! Delivery of one-time codes to the user.

use crate::models::UserRecord;
use async_trait::async_trait;
use code_cache::CodePurpose;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
#[error("code delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Sends a freshly issued code to the owner of the phone number.
#[async_trait]
pub trait CodeNotifier: Send + Sync {
    async fn deliver(
        &self,
        user: &UserRecord,
        purpose: CodePurpose,
        code: &str,
    ) -> Result<(), DeliveryError>;
}

/// Writes codes to the service log. There is no SMS gateway behind it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl CodeNotifier for LogNotifier {
    async fn deliver(
        &self,
        user: &UserRecord,
        purpose: CodePurpose,
        code: &str,
    ) -> Result<(), DeliveryError> {
        info!(
            uid = %user.uid,
            phonenumber = %user.phonenumber,
            %purpose,
            code,
            "Issued one-time code"
        );
        Ok(())
    }
}
