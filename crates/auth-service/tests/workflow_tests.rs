//! Registration and login flows against in-memory stores.

use async_trait::async_trait;
use auth_service::{
    code::CodeGenerator,
    models::UserUpdate,
    directory::{MemorySessionStore, MemoryUserDirectory, SessionStore, StoreError, UserDirectory},
    notify::{CodeNotifier, DeliveryError},
    token::{AccessClaims, IssuedTokens, JwtIssuer, RefreshClaims, TokenError, TokenIssuer},
    AuthError, AuthWorkflow, Session, UserRecord,
};
use chrono::Utc;
use code_cache::{CodePurpose, MemoryCodeCache, OneTimeCodeCache};
use common::{issuer, wrong_code, CapturingNotifier, PHONE};
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

mod common;

struct FailingNotifier;

#[async_trait]
impl CodeNotifier for FailingNotifier {
    async fn deliver(
        &self,
        _user: &UserRecord,
        _purpose: CodePurpose,
        _code: &str,
    ) -> Result<(), DeliveryError> {
        Err(DeliveryError("gateway unavailable".into()))
    }
}

mock! {
    Issuer {}

    impl TokenIssuer for Issuer {
        fn issue(
            &self,
            access: &AccessClaims,
            refresh: &RefreshClaims,
        ) -> Result<IssuedTokens, TokenError>;
    }
}

mock! {
    Directory {}

    #[async_trait]
    impl UserDirectory for Directory {
        async fn insert(&self, phonenumber: &str) -> Result<UserRecord, StoreError>;
        async fn select_by_phonenumber(&self, phonenumber: &str) -> Result<UserRecord, StoreError>;
        async fn select_by_uid(&self, uid: Uuid) -> Result<UserRecord, StoreError>;
        async fn update_fields(&self, uid: Uuid, update: UserUpdate) -> Result<(), StoreError>;
        async fn delete_unregistered(&self, older_than: Duration) -> Result<u64, StoreError>;
    }
}

mock! {
    Sessions {}

    #[async_trait]
    impl SessionStore for Sessions {
        async fn insert(&self, session: &Session) -> Result<Session, StoreError>;
    }
}

struct Harness {
    workflow: AuthWorkflow,
    users: MemoryUserDirectory,
    sessions: MemorySessionStore,
    notifier: CapturingNotifier,
    issuer: JwtIssuer,
}

fn harness() -> Harness {
    let users = MemoryUserDirectory::new();
    let sessions = MemorySessionStore::new();
    let notifier = CapturingNotifier::default();
    let issuer = issuer();

    let workflow = AuthWorkflow::new(
        Arc::new(users.clone()),
        Arc::new(sessions.clone()),
        Arc::new(MemoryCodeCache::new()),
        Arc::new(issuer.clone()),
    )
    .with_notifier(Arc::new(notifier.clone()));

    Harness {
        workflow,
        users,
        sessions,
        notifier,
        issuer,
    }
}

impl Harness {
    async fn registered_user(&self) -> UserRecord {
        let user = self.workflow.register(PHONE).await.unwrap();
        let code = self.notifier.code(CodePurpose::Register, user.uid);
        self.workflow.confirm_register(user.uid, &code).await.unwrap();
        self.users.select_by_uid(user.uid).await.unwrap()
    }
}

#[tokio::test]
async fn test_register_creates_single_record() {
    let h = harness();

    let user = h.workflow.register(PHONE).await.unwrap();
    assert_eq!(user.phonenumber, PHONE);
    assert!(!user.is_registered);
    assert_eq!(h.notifier.deliveries(), 1);

    let second = h.workflow.register(PHONE).await;
    assert!(matches!(second, Err(AuthError::RegistrationNotFinished)));

    assert_eq!(h.users.count_by_phonenumber(PHONE).await, 1);
    // No new code for the unfinished registration
    assert_eq!(h.notifier.deliveries(), 1);
}

#[tokio::test]
async fn test_register_after_confirmation_is_rejected() {
    let h = harness();
    h.registered_user().await;

    let result = h.workflow.register(PHONE).await;
    assert!(matches!(result, Err(AuthError::AlreadyRegistered)));
}

#[tokio::test]
async fn test_confirm_register_wrong_code() {
    let h = harness();
    let user = h.workflow.register(PHONE).await.unwrap();
    let code = h.notifier.code(CodePurpose::Register, user.uid);

    let result = h
        .workflow
        .confirm_register(user.uid, &wrong_code(&code))
        .await;
    assert!(matches!(result, Err(AuthError::WrongCodeProvided)));

    let stored = h.users.select_by_uid(user.uid).await.unwrap();
    assert!(!stored.is_registered);
    assert_eq!(h.sessions.count().await, 0);

    // The right code still works after a miss
    assert!(h.workflow.confirm_register(user.uid, &code).await.is_ok());
}

#[tokio::test]
async fn test_confirm_register_issues_tokens_and_session() {
    let h = harness();
    let user = h.workflow.register(PHONE).await.unwrap();
    let code = h.notifier.code(CodePurpose::Register, user.uid);

    let tokens = h.workflow.confirm_register(user.uid, &code).await.unwrap();

    let stored = h.users.select_by_uid(user.uid).await.unwrap();
    assert!(stored.is_registered);

    let sessions = h.sessions.for_user(user.uid).await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].user_uid, user.uid);
    assert_eq!(sessions[0].token, tokens.refresh_token);
    assert_eq!(
        sessions[0].expires_at - sessions[0].issued_at,
        chrono::Duration::hours(1)
    );

    let access = h.issuer.verify_access(&tokens.access_token).unwrap();
    assert_eq!(access.data.uid, user.uid);
    assert_eq!(access.data.phonenumber, PHONE);

    let refresh = h.issuer.verify_refresh(&tokens.refresh_token).unwrap();
    assert_eq!(refresh.data.uid, user.uid);
}

#[tokio::test]
async fn test_confirm_register_code_cannot_be_reused() {
    let h = harness();
    let user = h.workflow.register(PHONE).await.unwrap();
    let code = h.notifier.code(CodePurpose::Register, user.uid);

    h.workflow.confirm_register(user.uid, &code).await.unwrap();

    // The user is registered now, so the state check fires first
    let result = h.workflow.confirm_register(user.uid, &code).await;
    assert!(matches!(result, Err(AuthError::AlreadyRegistered)));
    assert_eq!(h.sessions.count().await, 1);
}

#[tokio::test]
async fn test_confirm_register_unknown_user() {
    let h = harness();

    let result = h.workflow.confirm_register(Uuid::new_v4(), "1234").await;
    assert!(matches!(result, Err(AuthError::NotFound)));
}

#[tokio::test(start_paused = true)]
async fn test_confirm_register_expired_code() {
    let h = harness();
    let user = h.workflow.register(PHONE).await.unwrap();
    let code = h.notifier.code(CodePurpose::Register, user.uid);

    tokio::time::advance(Duration::from_secs(31 * 60)).await;

    let result = h.workflow.confirm_register(user.uid, &code).await;
    assert!(matches!(result, Err(AuthError::WrongCodeProvided)));
}

#[tokio::test]
async fn test_login_requirements() {
    let h = harness();

    let missing = h.workflow.login(PHONE).await;
    assert!(matches!(missing, Err(AuthError::NotFound)));

    h.workflow.register(PHONE).await.unwrap();
    let unfinished = h.workflow.login(PHONE).await;
    assert!(matches!(unfinished, Err(AuthError::RegistrationNotFinished)));
}

#[tokio::test]
async fn test_login_flow() {
    let h = harness();
    let user = h.registered_user().await;

    h.workflow.login(PHONE).await.unwrap();
    let code = h.notifier.code(CodePurpose::Login, user.uid);

    let wrong = h.workflow.confirm_login(user.uid, &wrong_code(&code)).await;
    assert!(matches!(wrong, Err(AuthError::WrongCodeProvided)));

    let tokens = h.workflow.confirm_login(user.uid, &code).await.unwrap();
    assert!(h.issuer.verify_access(&tokens.access_token).is_ok());

    let reused = h.workflow.confirm_login(user.uid, &code).await;
    assert!(matches!(reused, Err(AuthError::WrongCodeProvided)));

    let sessions = h.sessions.for_user(user.uid).await;
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[1].token, tokens.refresh_token);

    // Login never touches the registration flag
    assert!(h.users.select_by_uid(user.uid).await.unwrap().is_registered);
}

#[tokio::test]
async fn test_confirm_login_requires_issued_code() {
    let h = harness();
    let user = h.registered_user().await;

    let result = h.workflow.confirm_login(user.uid, "1234").await;
    assert!(matches!(result, Err(AuthError::WrongCodeProvided)));
}

#[tokio::test]
async fn test_confirm_login_unregistered_user() {
    let h = harness();
    let user = h.workflow.register(PHONE).await.unwrap();
    let code = h.notifier.code(CodePurpose::Register, user.uid);

    // A registration code is not a login code, and the user is not registered
    let result = h.workflow.confirm_login(user.uid, &code).await;
    assert!(matches!(result, Err(AuthError::RegistrationNotFinished)));

    let missing = h.workflow.confirm_login(Uuid::new_v4(), &code).await;
    assert!(matches!(missing, Err(AuthError::NotFound)));
}

#[tokio::test]
async fn test_new_login_code_replaces_previous() {
    let h = harness();
    let user = h.registered_user().await;

    h.workflow.login(PHONE).await.unwrap();
    let first = h.notifier.code(CodePurpose::Login, user.uid);
    h.workflow.login(PHONE).await.unwrap();
    let second = h.notifier.code(CodePurpose::Login, user.uid);

    if first != second {
        let stale = h.workflow.confirm_login(user.uid, &first).await;
        assert!(matches!(stale, Err(AuthError::WrongCodeProvided)));
    }
    assert!(h.workflow.confirm_login(user.uid, &second).await.is_ok());
}

#[tokio::test]
async fn test_configured_code_length() {
    let users = MemoryUserDirectory::new();
    let notifier = CapturingNotifier::default();
    let workflow = AuthWorkflow::new(
        Arc::new(users),
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemoryCodeCache::new()),
        Arc::new(issuer()),
    )
    .with_notifier(Arc::new(notifier.clone()))
    .with_code_generator(CodeGenerator::new(6).unwrap());

    let user = workflow.register(PHONE).await.unwrap();
    let code = notifier.code(CodePurpose::Register, user.uid);

    assert_eq!(code.len(), 6);
    assert!(workflow.confirm_register(user.uid, &code).await.is_ok());
}

#[tokio::test]
async fn test_notifier_failure_is_internal() {
    let users = MemoryUserDirectory::new();
    let workflow = AuthWorkflow::new(
        Arc::new(users.clone()),
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemoryCodeCache::new()),
        Arc::new(issuer()),
    )
    .with_notifier(Arc::new(FailingNotifier));

    let result = workflow.register(PHONE).await;
    assert!(matches!(result, Err(AuthError::Internal(_))));

    // The record stays; retries are refused until the reaper removes it
    assert_eq!(users.count_by_phonenumber(PHONE).await, 1);
    let retry = workflow.register(PHONE).await;
    assert!(matches!(retry, Err(AuthError::RegistrationNotFinished)));
}

#[tokio::test]
async fn test_register_losing_insert_race_is_internal() {
    let mut users = MockDirectory::new();
    users
        .expect_select_by_phonenumber()
        .times(1)
        .returning(|_| Err(StoreError::NotFound));
    users
        .expect_insert()
        .times(1)
        .returning(|_| Err(StoreError::AlreadyExists));

    let notifier = CapturingNotifier::default();
    let workflow = AuthWorkflow::new(
        Arc::new(users),
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemoryCodeCache::new()),
        Arc::new(issuer()),
    )
    .with_notifier(Arc::new(notifier.clone()));

    let result = workflow.register(PHONE).await;
    assert!(matches!(result, Err(AuthError::Internal(_))));
    assert_eq!(notifier.deliveries(), 0);
}

#[tokio::test]
async fn test_confirm_register_after_user_reaped() {
    let now = Utc::now();
    let user = UserRecord {
        uid: Uuid::new_v4(),
        phonenumber: PHONE.to_string(),
        is_registered: false,
        created_at: now,
        updated_at: now,
    };
    let uid = user.uid;

    let mut users = MockDirectory::new();
    users
        .expect_select_by_uid()
        .times(1)
        .returning(move |_| Ok(user.clone()));
    // Deleted between the lookup and the update
    users
        .expect_update_fields()
        .times(1)
        .returning(|_, _| Err(StoreError::NotFound));

    let codes = MemoryCodeCache::new();
    codes
        .set(CodePurpose::Register, uid, "1234", Duration::from_secs(60))
        .await
        .unwrap();

    let sessions = MemorySessionStore::new();
    let workflow = AuthWorkflow::new(
        Arc::new(users),
        Arc::new(sessions.clone()),
        Arc::new(codes),
        Arc::new(issuer()),
    );

    let result = workflow.confirm_register(uid, "1234").await;
    assert!(matches!(result, Err(AuthError::NotFound)));
    assert_eq!(sessions.count().await, 0);
}

#[tokio::test]
async fn test_token_failure_leaves_user_registered() {
    let users = MemoryUserDirectory::new();
    let sessions = MemorySessionStore::new();
    let notifier = CapturingNotifier::default();

    let mut tokens = MockIssuer::new();
    tokens
        .expect_issue()
        .times(1)
        .returning(|_, _| Err(TokenError::Signing("key unavailable".into())));

    let workflow = AuthWorkflow::new(
        Arc::new(users.clone()),
        Arc::new(sessions.clone()),
        Arc::new(MemoryCodeCache::new()),
        Arc::new(tokens),
    )
    .with_notifier(Arc::new(notifier.clone()));

    let user = workflow.register(PHONE).await.unwrap();
    let code = notifier.code(CodePurpose::Register, user.uid);

    let result = workflow.confirm_register(user.uid, &code).await;
    assert!(matches!(result, Err(AuthError::Internal(_))));

    // Registration is not rolled back; the user recovers through login
    assert!(users.select_by_uid(user.uid).await.unwrap().is_registered);
    assert_eq!(sessions.count().await, 0);
}

#[tokio::test]
async fn test_session_store_failure_is_internal() {
    let users = MemoryUserDirectory::new();
    let notifier = CapturingNotifier::default();

    let mut sessions = MockSessions::new();
    sessions
        .expect_insert()
        .times(1)
        .returning(|_| Err(StoreError::Backend("connection reset".into())));

    let workflow = AuthWorkflow::new(
        Arc::new(users.clone()),
        Arc::new(sessions),
        Arc::new(MemoryCodeCache::new()),
        Arc::new(issuer()),
    )
    .with_notifier(Arc::new(notifier.clone()));

    let user = workflow.register(PHONE).await.unwrap();
    let code = notifier.code(CodePurpose::Register, user.uid);

    let result = workflow.confirm_register(user.uid, &code).await;
    assert!(matches!(result, Err(AuthError::Internal(_))));
}

#[tokio::test]
async fn test_phone_scenario_end_to_end() {
    let h = harness();

    let user = h.workflow.register("9009009090").await.unwrap();
    assert!(!user.is_registered);

    let code = h.notifier.code(CodePurpose::Register, user.uid);
    assert_eq!(code.len(), 4);

    let registered = h.workflow.confirm_register(user.uid, &code).await.unwrap();
    assert!(h.issuer.verify_refresh(&registered.refresh_token).is_ok());

    assert!(matches!(
        h.workflow.register("9009009090").await,
        Err(AuthError::AlreadyRegistered)
    ));

    h.workflow.login("9009009090").await.unwrap();
    let login_code = h.notifier.code(CodePurpose::Login, user.uid);
    let logged_in = h.workflow.confirm_login(user.uid, &login_code).await.unwrap();

    let claims = h.issuer.verify_access(&logged_in.access_token).unwrap();
    assert_eq!(claims.data.phonenumber, "9009009090");
    assert_eq!(h.sessions.for_user(user.uid).await.len(), 2);
}
