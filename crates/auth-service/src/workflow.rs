//! Registration and login state machine.
//!
//! A user record moves `unregistered -> registered` through a one-time code
//! sent at registration; a registered user logs in with a fresh code. Every
//! successful confirmation issues a token pair and appends a session.

use crate::code::CodeGenerator;
use crate::directory::{SessionStore, StoreError, UserDirectory};
use crate::error::AuthError;
use crate::models::{Session, TokenPair, UserRecord, UserUpdate};
use crate::notify::{CodeNotifier, LogNotifier};
use crate::token::{AccessClaims, RefreshClaims, TokenIssuer};
use code_cache::{CodePurpose, OneTimeCodeCache};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Default lifetime of a pending code.
pub const DEFAULT_CODE_TTL: Duration = Duration::from_secs(30 * 60);

/// Orchestrates the directory, code cache, token issuer and session log.
pub struct AuthWorkflow {
    users: Arc<dyn UserDirectory>,
    sessions: Arc<dyn SessionStore>,
    codes: Arc<dyn OneTimeCodeCache>,
    tokens: Arc<dyn TokenIssuer>,
    notifier: Arc<dyn CodeNotifier>,
    generator: CodeGenerator,
    code_ttl: Duration,
}

impl AuthWorkflow {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        sessions: Arc<dyn SessionStore>,
        codes: Arc<dyn OneTimeCodeCache>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            users,
            sessions,
            codes,
            tokens,
            notifier: Arc::new(LogNotifier),
            generator: CodeGenerator::default(),
            code_ttl: DEFAULT_CODE_TTL,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn CodeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_code_generator(mut self, generator: CodeGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_code_ttl(mut self, ttl: Duration) -> Self {
        self.code_ttl = ttl;
        self
    }

    /// Create an unregistered user and send it a registration code.
    ///
    /// A phonenumber with a pending registration is rejected with
    /// [`AuthError::RegistrationNotFinished`] and no new code is sent. If the
    /// first delivery failed, the number stays locked this way until the
    /// reaper deletes the unconfirmed record.
    #[instrument(skip(self))]
    pub async fn register(&self, phonenumber: &str) -> Result<UserRecord, AuthError> {
        match self.users.select_by_phonenumber(phonenumber).await {
            Ok(existing) if existing.is_registered => return Err(AuthError::AlreadyRegistered),
            Ok(_) => return Err(AuthError::RegistrationNotFinished),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        // A concurrent insert of the same phonenumber fails here as Internal.
        let user = self.users.insert(phonenumber).await?;
        info!(uid = %user.uid, "Created unregistered user");

        self.issue_code(&user, CodePurpose::Register).await?;
        Ok(user)
    }

    /// Check the registration code and mark the user registered.
    #[instrument(skip(self, code))]
    pub async fn confirm_register(&self, uid: Uuid, code: &str) -> Result<TokenPair, AuthError> {
        let user = self.users.select_by_uid(uid).await?;
        if user.is_registered {
            return Err(AuthError::AlreadyRegistered);
        }

        self.check_code(CodePurpose::Register, uid, code).await?;

        self.users
            .update_fields(uid, UserUpdate::new().is_registered(true))
            .await?;
        info!(%uid, "User registered");

        self.discard_code(CodePurpose::Register, uid).await;
        self.open_session(&user).await
    }

    /// Send a login code to a registered user.
    #[instrument(skip(self))]
    pub async fn login(&self, phonenumber: &str) -> Result<(), AuthError> {
        let user = self.users.select_by_phonenumber(phonenumber).await?;
        if !user.is_registered {
            return Err(AuthError::RegistrationNotFinished);
        }

        self.issue_code(&user, CodePurpose::Login).await
    }

    /// Check the login code and issue a token pair.
    #[instrument(skip(self, code))]
    pub async fn confirm_login(&self, uid: Uuid, code: &str) -> Result<TokenPair, AuthError> {
        let user = self.users.select_by_uid(uid).await?;
        if !user.is_registered {
            return Err(AuthError::RegistrationNotFinished);
        }

        self.check_code(CodePurpose::Login, uid, code).await?;

        self.discard_code(CodePurpose::Login, uid).await;
        self.open_session(&user).await
    }

    async fn issue_code(&self, user: &UserRecord, purpose: CodePurpose) -> Result<(), AuthError> {
        let code = self.generator.generate();
        self.codes
            .set(purpose, user.uid, &code, self.code_ttl)
            .await?;
        self.notifier.deliver(user, purpose, &code).await?;
        Ok(())
    }

    async fn check_code(
        &self,
        purpose: CodePurpose,
        uid: Uuid,
        provided: &str,
    ) -> Result<(), AuthError> {
        let expected = self.codes.get(purpose, uid).await?;
        if expected != provided {
            warn!(%uid, %purpose, "Wrong code provided");
            return Err(AuthError::WrongCodeProvided);
        }
        Ok(())
    }

    async fn discard_code(&self, purpose: CodePurpose, uid: Uuid) {
        if let Err(e) = self.codes.delete(purpose, uid).await {
            warn!(%uid, %purpose, error = %e, "Failed to delete consumed code");
        }
    }

    async fn open_session(&self, user: &UserRecord) -> Result<TokenPair, AuthError> {
        let issued = self.tokens.issue(
            &AccessClaims {
                uid: user.uid,
                phonenumber: user.phonenumber.clone(),
            },
            &RefreshClaims { uid: user.uid },
        )?;

        self.sessions
            .insert(&Session {
                user_uid: user.uid,
                token: issued.refresh_token.clone(),
                issued_at: issued.refresh_issued_at,
                expires_at: issued.refresh_expires_at,
            })
            .await?;

        Ok(issued.pair())
    }
}
