//! # Test Helper Library
//!
//! Scripted login backend shared by the integration tests. Every attempt it
//! hands out counts its releases, so tests can check that no login handle is
//! leaked whichever way a wizard ends.

#![allow(dead_code)]

use async_trait::async_trait;
use sessiongen_bot::auth::{AuthError, AuthService, CodeOutcome, LoginAttempt, SessionMaterial};
use sessiongen_bot::dialogue::Credentials;
use sessiongen_bot::wizard::WizardService;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Data centre every scripted login ends up on
pub const TEST_DC: i32 = 2;
/// Telegram user id of the scripted account
pub const TEST_ACCOUNT_ID: i64 = 123_456_789;
/// Auth key byte of the scripted account
pub const TEST_KEY_BYTE: u8 = 0x5A;

/// What `submit_code` answers
#[derive(Debug, Clone)]
pub enum CodeScript {
    Authorized,
    PasswordRequired(Option<String>),
    Fail(AuthError),
}

/// What `submit_password` answers
#[derive(Debug, Clone)]
pub enum PasswordScript {
    Authorized,
    Fail(AuthError),
}

/// Counters shared between a mock service and the attempts it created
#[derive(Debug, Default)]
pub struct MockStats {
    pub code_requests: AtomicUsize,
    pub attempts_created: AtomicUsize,
    pub releases: AtomicUsize,
    pub codes_submitted: AtomicUsize,
    pub passwords_submitted: AtomicUsize,
}

impl MockStats {
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn attempts_created(&self) -> usize {
        self.attempts_created.load(Ordering::SeqCst)
    }

    pub fn code_requests(&self) -> usize {
        self.code_requests.load(Ordering::SeqCst)
    }

    pub fn passwords_submitted(&self) -> usize {
        self.passwords_submitted.load(Ordering::SeqCst)
    }
}

/// Scripted [`AuthService`]
pub struct MockAuthService {
    pub request_result: Result<(), AuthError>,
    pub code_script: CodeScript,
    pub password_script: PasswordScript,
    pub stats: Arc<MockStats>,
    /// When set, `request_code` waits for a notification before answering
    pub request_gate: Option<Arc<Notify>>,
    /// When set, every attempt's `submit_code` waits the same way
    pub code_gate: Option<Arc<Notify>>,
}

impl MockAuthService {
    pub fn new(code_script: CodeScript, password_script: PasswordScript) -> Self {
        Self {
            request_result: Ok(()),
            code_script,
            password_script,
            stats: Arc::new(MockStats::default()),
            request_gate: None,
            code_gate: None,
        }
    }

    /// Backend that signs in straight away with the code
    pub fn authorizing() -> Self {
        Self::new(CodeScript::Authorized, PasswordScript::Authorized)
    }

    /// Backend for an account with a 2FA password
    pub fn two_factor(hint: Option<&str>, password_script: PasswordScript) -> Self {
        Self::new(
            CodeScript::PasswordRequired(hint.map(str::to_string)),
            password_script,
        )
    }

    pub fn failing_request(error: AuthError) -> Self {
        Self {
            request_result: Err(error),
            ..Self::authorizing()
        }
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.request_gate = Some(gate);
        self
    }

    pub fn gated_code(mut self, gate: Arc<Notify>) -> Self {
        self.code_gate = Some(gate);
        self
    }
}

#[async_trait]
impl AuthService for MockAuthService {
    async fn request_code(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn LoginAttempt>, AuthError> {
        self.stats.code_requests.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.request_gate {
            gate.notified().await;
        }

        self.request_result.clone()?;
        self.stats.attempts_created.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockLoginAttempt {
            api_id: credentials.api_id,
            code_script: self.code_script.clone(),
            password_script: self.password_script.clone(),
            stats: Arc::clone(&self.stats),
            code_gate: self.code_gate.clone(),
        }))
    }
}

/// Attempt handed out by [`MockAuthService`]
pub struct MockLoginAttempt {
    api_id: i32,
    code_script: CodeScript,
    password_script: PasswordScript,
    stats: Arc<MockStats>,
    code_gate: Option<Arc<Notify>>,
}

impl MockLoginAttempt {
    fn material(&self) -> SessionMaterial {
        test_material(self.api_id)
    }
}

#[async_trait]
impl LoginAttempt for MockLoginAttempt {
    async fn submit_code(&mut self, _code: &str) -> Result<CodeOutcome, AuthError> {
        self.stats.codes_submitted.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.code_gate {
            gate.notified().await;
        }
        match &self.code_script {
            CodeScript::Authorized => Ok(CodeOutcome::Authorized(self.material())),
            CodeScript::PasswordRequired(hint) => {
                Ok(CodeOutcome::PasswordRequired { hint: hint.clone() })
            }
            CodeScript::Fail(error) => Err(error.clone()),
        }
    }

    async fn submit_password(&mut self, _password: &str) -> Result<SessionMaterial, AuthError> {
        self.stats.passwords_submitted.fetch_add(1, Ordering::SeqCst);
        match &self.password_script {
            PasswordScript::Authorized => Ok(self.material()),
            PasswordScript::Fail(error) => Err(error.clone()),
        }
    }

    async fn release(self: Box<Self>) {
        self.stats.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Session material as the scripted backend produces it
pub fn test_material(api_id: i32) -> SessionMaterial {
    SessionMaterial {
        dc_id: TEST_DC,
        user_id: TEST_ACCOUNT_ID,
        auth_key: [TEST_KEY_BYTE; 256],
        api_id,
        test_mode: false,
        is_bot: false,
    }
}

/// Wizard over a mock backend, plus the mock's counters
pub fn setup_wizard(auth: MockAuthService) -> (Arc<WizardService>, Arc<MockStats>) {
    let stats = Arc::clone(&auth.stats);
    (Arc::new(WizardService::new(Arc::new(auth))), stats)
}

/// Like [`setup_wizard`], with a short bound on each login backend call
pub fn setup_wizard_with_timeout(
    auth: MockAuthService,
    login_timeout: Duration,
) -> (Arc<WizardService>, Arc<MockStats>) {
    let stats = Arc::clone(&auth.stats);
    let wizard = WizardService::new(Arc::new(auth)).with_login_timeout(login_timeout);
    (Arc::new(wizard), stats)
}
