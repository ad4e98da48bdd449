//! # Session Wizard
//!
//! Drives a user from `/sessiongen` to a finished session string:
//!
//! ```text
//! (start) ─► ChoosingLibrary ─button─► AwaitingApiId ─► AwaitingApiHash ─► AwaitingPhone
//!                                                                               │ request code
//!                                                                               ▼
//!                            Done ◄──── success ──── AwaitingPassword ◄─2FA─ AwaitingCode ─► Done
//! ```
//!
//! Every call returns the single reply to send to the user (or `None` when the
//! event is not wizard input). Any failure of a login backend call destroys the
//! session and releases its login handle; there are no retries.
//!
//! Text input is handled in two halves. [`WizardService::begin_text`] updates
//! the session under the store lock and returns immediately; when a login
//! backend call is needed it hands back a [`LoginCall`], which
//! [`WizardService::run_login`] drives to completion. The bot runs that second
//! half on its own task so `/cancel` is never queued behind Telegram.
//!
//! Telegram-independent so the whole flow can be driven from tests.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use teloxide::types::UserId;
use tracing::{debug, info, warn, Instrument};

use crate::auth::{AuthError, AuthService, CodeOutcome, LoginAttempt, SessionMaterial};
use crate::dialogue::{Credentials, SessionLibrary, WizardSession, WizardStep, CALLBACK_CANCEL};
use crate::errors::error_logging;
use crate::observability::{self, AuthStage, WizardOutcome};
use crate::session_store::SessionStore;
use crate::session_string;
use crate::validation::{normalize_input, parse_api_id};

/// Session string handed to the user; hidden from `Debug` output
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString(<{} chars>)", self.0.len())
    }
}

/// What the user should be told after a wizard event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardReply {
    /// Library choice prompt with its inline keyboard
    ChooseLibrary,
    AskApiId { library: SessionLibrary },
    InvalidApiId,
    AskApiHash,
    AskPhone,
    CodeSent,
    AskPassword { hint: Option<String> },
    SessionReady {
        library: SessionLibrary,
        session_string: SecretString,
        two_factor: bool,
    },
    CodeRequestFailed { reason: String },
    SignInFailed { reason: String },
    WrongPassword,
    PasswordFailed { reason: String },
    Cancelled,
    /// A login backend call for this user is still running
    Busy,
}

/// Default upper bound on a single login backend call
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(120);

/// What a text message turned into once the session was updated
pub enum TextStep {
    /// Not wizard input; nothing to send
    Ignored,
    /// Answer right away
    Reply(WizardReply),
    /// A login backend call has to finish before the user can be answered
    Login(LoginCall),
}

/// Login backend work claimed by [`WizardService::begin_text`]
///
/// The session is marked as having a call in flight until
/// [`WizardService::run_login`] consumes this.
pub struct LoginCall {
    user_id: UserId,
    input: String,
    action: Action,
}

impl LoginCall {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl fmt::Debug for LoginCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCall")
            .field("user_id", &self.user_id)
            .field("action", &self.action.name())
            .finish()
    }
}

/// Backend work decided under the store lock, executed after it is released
enum Action {
    RequestCode {
        generation: u64,
        credentials: Credentials,
    },
    SubmitCode {
        generation: u64,
        library: SessionLibrary,
        attempt: Box<dyn LoginAttempt>,
    },
    SubmitPassword {
        generation: u64,
        library: SessionLibrary,
        attempt: Box<dyn LoginAttempt>,
    },
    Abort {
        generation: u64,
        reason: &'static str,
    },
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::RequestCode { .. } => "request_code",
            Action::SubmitCode { .. } => "submit_code",
            Action::SubmitPassword { .. } => "submit_password",
            Action::Abort { .. } => "abort",
        }
    }
}

/// Owns every user's wizard session and the login backend
pub struct WizardService {
    store: SessionStore,
    auth: Arc<dyn AuthService>,
    login_timeout: Duration,
}

impl WizardService {
    pub fn new(auth: Arc<dyn AuthService>) -> Self {
        Self {
            store: SessionStore::new(),
            auth,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
        }
    }

    /// Bound every login backend call; a call that runs longer fails the wizard
    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn active_sessions(&self) -> usize {
        self.store.len()
    }

    /// Start (or restart) the wizard for a user
    pub async fn start(&self, user_id: UserId) -> WizardReply {
        let generation = self.store.next_generation();
        let replaced = self.store.insert(WizardSession::new(user_id, generation));

        if let Some(old) = replaced {
            debug!(user_id = %user_id, old_step = old.step.as_str(), "Replacing existing wizard");
            self.discard(old, WizardOutcome::Replaced).await;
        }

        observability::record_wizard_started();
        observability::update_active_wizards(self.store.len());
        info!(user_id = %user_id, generation, "Session wizard started");

        WizardReply::ChooseLibrary
    }

    /// Cancel the user's wizard, whatever step it is at
    pub async fn cancel(&self, user_id: UserId) -> WizardReply {
        match self.store.remove(user_id) {
            Some(session) => {
                info!(user_id = %user_id, step = session.step.as_str(), "Session wizard cancelled");
                self.discard(session, WizardOutcome::Cancelled).await;
                observability::update_active_wizards(self.store.len());
            }
            None => debug!(user_id = %user_id, "Cancel requested without an active wizard"),
        }
        WizardReply::Cancelled
    }

    /// Handle an inline button press
    ///
    /// Returns `None` for payloads that are not wizard buttons, and for library
    /// buttons pressed when the user is not choosing a library.
    pub async fn handle_callback(&self, user_id: UserId, data: &str) -> Option<WizardReply> {
        if data == CALLBACK_CANCEL {
            return Some(self.cancel(user_id).await);
        }

        let library = SessionLibrary::from_callback_data(data)?;

        self.store
            .with_session(user_id, |session| {
                if session.step != WizardStep::ChoosingLibrary {
                    return None;
                }
                session.library = Some(library);
                session.advance(WizardStep::AwaitingApiId);
                Some(WizardReply::AskApiId { library })
            })
            .flatten()
    }

    /// Handle a plain text message, running any login backend call inline
    ///
    /// Returns `None` when the user has no wizard or the wizard is not waiting
    /// for text.
    pub async fn handle_text(&self, user_id: UserId, text: &str) -> Option<WizardReply> {
        match self.begin_text(user_id, text) {
            TextStep::Ignored => None,
            TextStep::Reply(reply) => Some(reply),
            TextStep::Login(call) => self.run_login(call).await,
        }
    }

    /// Apply a text message to the user's session without awaiting anything
    ///
    /// When the input needs a login backend call the session is marked busy
    /// and the call is returned for [`run_login`](Self::run_login).
    pub fn begin_text(&self, user_id: UserId, text: &str) -> TextStep {
        let Some(input) = normalize_input(text) else {
            return TextStep::Ignored;
        };
        let login = |action| {
            TextStep::Login(LoginCall {
                user_id,
                input: input.to_string(),
                action,
            })
        };

        self.store
            .with_session(user_id, |session| {
                if session.call_in_flight {
                    return TextStep::Reply(WizardReply::Busy);
                }

                match session.step {
                    WizardStep::ChoosingLibrary | WizardStep::Done => TextStep::Ignored,
                    WizardStep::AwaitingApiId => match parse_api_id(input) {
                        Ok(api_id) => {
                            session.credentials.api_id = api_id;
                            session.advance(WizardStep::AwaitingApiHash);
                            TextStep::Reply(WizardReply::AskApiHash)
                        }
                        Err(kind) => {
                            debug!(user_id = %user_id, error = kind, "Rejected API_ID input");
                            TextStep::Reply(WizardReply::InvalidApiId)
                        }
                    },
                    WizardStep::AwaitingApiHash => {
                        session.credentials.api_hash = input.to_string();
                        session.advance(WizardStep::AwaitingPhone);
                        TextStep::Reply(WizardReply::AskPhone)
                    }
                    WizardStep::AwaitingPhone => {
                        session.credentials.phone_number = input.to_string();
                        session.call_in_flight = true;
                        login(Action::RequestCode {
                            generation: session.generation,
                            credentials: session.credentials.clone(),
                        })
                    }
                    WizardStep::AwaitingCode | WizardStep::AwaitingPassword => {
                        let generation = session.generation;
                        let abort = Action::Abort {
                            generation,
                            reason: "the login attempt is no longer available, please start again",
                        };
                        let Some(library) = session.library else {
                            return login(abort);
                        };
                        let Some(attempt) = session.pending_login.take() else {
                            return login(abort);
                        };
                        session.call_in_flight = true;
                        if session.step == WizardStep::AwaitingCode {
                            login(Action::SubmitCode {
                                generation,
                                library,
                                attempt,
                            })
                        } else {
                            login(Action::SubmitPassword {
                                generation,
                                library,
                                attempt,
                            })
                        }
                    }
                }
            })
            .unwrap_or(TextStep::Ignored)
    }

    /// Drive a claimed login backend call to completion
    ///
    /// Returns `None` when the wizard was cancelled or replaced while the call
    /// was running; the login handle is released either way.
    pub async fn run_login(&self, call: LoginCall) -> Option<WizardReply> {
        let LoginCall {
            user_id,
            input,
            action,
        } = call;

        match action {
            Action::RequestCode {
                generation,
                credentials,
            } => self.request_code(user_id, generation, credentials).await,
            Action::SubmitCode {
                generation,
                library,
                attempt,
            } => {
                self.submit_code(user_id, generation, library, attempt, &input)
                    .await
            }
            Action::SubmitPassword {
                generation,
                library,
                attempt,
            } => {
                self.submit_password(user_id, generation, library, attempt, &input)
                    .await
            }
            Action::Abort { generation, reason } => {
                self.finish(
                    user_id,
                    generation,
                    None,
                    WizardOutcome::Failed(AuthStage::SubmitCode),
                    WizardReply::SignInFailed {
                        reason: reason.to_string(),
                    },
                )
                .await
            }
        }
    }

    /// Release every login handle; used on shutdown
    pub async fn shutdown(&self) {
        let sessions = self.store.drain();
        if !sessions.is_empty() {
            info!(count = sessions.len(), "Releasing active wizards on shutdown");
        }
        for session in sessions {
            self.discard(session, WizardOutcome::Cancelled).await;
        }
        observability::update_active_wizards(0);
    }

    async fn request_code(
        &self,
        user_id: UserId,
        generation: u64,
        credentials: Credentials,
    ) -> Option<WizardReply> {
        let result = self
            .call_backend(
                AuthStage::RequestCode,
                user_id,
                self.auth.request_code(&credentials),
            )
            .await;

        match result {
            Ok(attempt) => {
                let stale = self.store_attempt(user_id, generation, attempt, WizardStep::AwaitingCode);
                if let Some(stale) = stale {
                    debug!(user_id = %user_id, "Wizard ended while requesting the code");
                    stale.release().await;
                    return None;
                }
                info!(user_id = %user_id, "Login code sent");
                Some(WizardReply::CodeSent)
            }
            Err(e) => {
                error_logging::log_auth_error(&e, AuthStage::RequestCode.as_str(), user_id.0, None);
                self.finish(
                    user_id,
                    generation,
                    None,
                    WizardOutcome::Failed(AuthStage::RequestCode),
                    WizardReply::CodeRequestFailed {
                        reason: e.to_string(),
                    },
                )
                .await
            }
        }
    }

    async fn submit_code(
        &self,
        user_id: UserId,
        generation: u64,
        library: SessionLibrary,
        mut attempt: Box<dyn LoginAttempt>,
        code: &str,
    ) -> Option<WizardReply> {
        let result = self
            .call_backend(AuthStage::SubmitCode, user_id, attempt.submit_code(code))
            .await;

        match result {
            Ok(CodeOutcome::Authorized(material)) => {
                self.complete(user_id, generation, library, attempt, &material, false)
                    .await
            }
            Ok(CodeOutcome::PasswordRequired { hint }) => {
                let stale =
                    self.store_attempt(user_id, generation, attempt, WizardStep::AwaitingPassword);
                if let Some(stale) = stale {
                    debug!(user_id = %user_id, "Wizard ended while submitting the code");
                    stale.release().await;
                    return None;
                }
                info!(user_id = %user_id, "Account requires a 2FA password");
                Some(WizardReply::AskPassword { hint })
            }
            Err(e) => {
                error_logging::log_auth_error(
                    &e,
                    AuthStage::SubmitCode.as_str(),
                    user_id.0,
                    Some(library.display_name()),
                );
                self.finish(
                    user_id,
                    generation,
                    Some(attempt),
                    WizardOutcome::Failed(AuthStage::SubmitCode),
                    WizardReply::SignInFailed {
                        reason: e.to_string(),
                    },
                )
                .await
            }
        }
    }

    async fn submit_password(
        &self,
        user_id: UserId,
        generation: u64,
        library: SessionLibrary,
        mut attempt: Box<dyn LoginAttempt>,
        password: &str,
    ) -> Option<WizardReply> {
        let result = self
            .call_backend(
                AuthStage::SubmitPassword,
                user_id,
                attempt.submit_password(password),
            )
            .await;

        match result {
            Ok(material) => {
                self.complete(user_id, generation, library, attempt, &material, true)
                    .await
            }
            Err(e) => {
                error_logging::log_auth_error(
                    &e,
                    AuthStage::SubmitPassword.as_str(),
                    user_id.0,
                    Some(library.display_name()),
                );
                let reply = match e {
                    AuthError::InvalidPassword => WizardReply::WrongPassword,
                    other => WizardReply::PasswordFailed {
                        reason: other.to_string(),
                    },
                };
                self.finish(
                    user_id,
                    generation,
                    Some(attempt),
                    WizardOutcome::Failed(AuthStage::SubmitPassword),
                    reply,
                )
                .await
            }
        }
    }

    /// Run one login backend call under the login timeout, with its span and metrics
    async fn call_backend<T>(
        &self,
        stage: AuthStage,
        user_id: UserId,
        call: impl Future<Output = Result<T, AuthError>>,
    ) -> Result<T, AuthError> {
        let start = Instant::now();
        let bounded = tokio::time::timeout(self.login_timeout, call)
            .instrument(observability::auth_span(stage.as_str(), user_id.0));
        let result = match bounded.await {
            Ok(result) => result,
            Err(_) => {
                warn!(user_id = %user_id, stage = stage.as_str(), "Login backend call timed out");
                Err(AuthError::Timeout(self.login_timeout))
            }
        };
        observability::record_auth_call_metrics(stage, result.is_ok(), start.elapsed());
        result
    }

    /// Encode the session string and end the wizard
    async fn complete(
        &self,
        user_id: UserId,
        generation: u64,
        library: SessionLibrary,
        attempt: Box<dyn LoginAttempt>,
        material: &SessionMaterial,
        two_factor: bool,
    ) -> Option<WizardReply> {
        match session_string::encode(library, material) {
            Ok(encoded) => {
                info!(
                    user_id = %user_id,
                    library = library.display_name(),
                    dc_id = material.dc_id,
                    two_factor,
                    "Session string generated"
                );
                self.finish(
                    user_id,
                    generation,
                    Some(attempt),
                    WizardOutcome::Completed,
                    WizardReply::SessionReady {
                        library,
                        session_string: SecretString::new(encoded),
                        two_factor,
                    },
                )
                .await
            }
            Err(e) => {
                error_logging::log_internal_error(
                    &e,
                    "session_string",
                    "encode",
                    Some(user_id.0),
                );
                let stage = if two_factor {
                    AuthStage::SubmitPassword
                } else {
                    AuthStage::SubmitCode
                };
                let reason = e.to_string();
                let reply = if two_factor {
                    WizardReply::PasswordFailed { reason }
                } else {
                    WizardReply::SignInFailed { reason }
                };
                self.finish(user_id, generation, Some(attempt), WizardOutcome::Failed(stage), reply)
                    .await
            }
        }
    }

    /// Put the login handle back into the session and advance it.
    ///
    /// Hands the attempt back when the session was cancelled or replaced in the meantime.
    fn store_attempt(
        &self,
        user_id: UserId,
        generation: u64,
        attempt: Box<dyn LoginAttempt>,
        next: WizardStep,
    ) -> Option<Box<dyn LoginAttempt>> {
        let mut slot = Some(attempt);
        self.store.with_generation(user_id, generation, |session| {
            session.pending_login = slot.take();
            session.call_in_flight = false;
            session.advance(next);
        });
        slot
    }

    /// Destroy the session (if it is still this generation), release the login
    /// handle, and return `reply` unless the session had already gone away.
    async fn finish(
        &self,
        user_id: UserId,
        generation: u64,
        attempt: Option<Box<dyn LoginAttempt>>,
        outcome: WizardOutcome,
        reply: WizardReply,
    ) -> Option<WizardReply> {
        let removed = self.store.remove_if_generation(user_id, generation);

        if let Some(attempt) = attempt {
            attempt.release().await;
        }

        let Some(mut session) = removed else {
            warn!(user_id = %user_id, outcome = outcome.as_str(), "Wizard ended before its login call returned");
            return None;
        };

        if outcome == WizardOutcome::Completed {
            session.advance(WizardStep::Done);
        }
        self.discard(session, outcome).await;
        observability::update_active_wizards(self.store.len());
        Some(reply)
    }

    /// Release whatever a removed session still holds and record how it ended
    async fn discard(&self, session: WizardSession, outcome: WizardOutcome) {
        let duration = session.age().to_std().unwrap_or_default();
        observability::record_wizard_finished(outcome, session.step, duration);

        if let Some(attempt) = session.pending_login {
            attempt.release().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct UnreachableAuth;

    #[async_trait]
    impl AuthService for UnreachableAuth {
        async fn request_code(
            &self,
            _credentials: &Credentials,
        ) -> Result<Box<dyn LoginAttempt>, AuthError> {
            Err(AuthError::Transport("network unreachable".to_string()))
        }
    }

    fn service() -> WizardService {
        WizardService::new(Arc::new(UnreachableAuth))
    }

    #[tokio::test]
    async fn test_text_without_session_is_ignored() {
        let wizard = service();
        assert_eq!(wizard.handle_text(UserId(1), "12345").await, None);
        assert!(wizard.store().is_empty());
    }

    #[tokio::test]
    async fn test_text_while_choosing_library_is_ignored() {
        let wizard = service();
        wizard.start(UserId(1)).await;
        assert_eq!(wizard.handle_text(UserId(1), "12345").await, None);
        assert_eq!(wizard.store().step(UserId(1)), Some(WizardStep::ChoosingLibrary));
    }

    #[tokio::test]
    async fn test_unknown_callback_is_ignored() {
        let wizard = service();
        wizard.start(UserId(1)).await;
        assert_eq!(wizard.handle_callback(UserId(1), "gen_unknown").await, None);
        assert_eq!(wizard.handle_callback(UserId(1), "page:2").await, None);
        assert_eq!(wizard.store().step(UserId(1)), Some(WizardStep::ChoosingLibrary));
    }

    #[tokio::test]
    async fn test_request_code_failure_destroys_session() {
        let wizard = service();
        let user = UserId(5);
        wizard.start(user).await;
        wizard.handle_callback(user, "gen_telethon").await;
        wizard.handle_text(user, "12345").await;
        wizard.handle_text(user, "abc").await;

        let reply = wizard.handle_text(user, "+15550001111").await;
        assert!(matches!(reply, Some(WizardReply::CodeRequestFailed { ref reason }) if reason.contains("network unreachable")));
        assert!(!wizard.store().contains(user));
    }

    #[test]
    fn test_secret_string_debug_hides_value() {
        let secret = SecretString::new("1BVtsOKABu...".to_string());
        let rendered = format!("{:?}", secret);
        assert!(!rendered.contains("1BVts"));
        assert_eq!(secret.expose(), "1BVtsOKABu...");
    }

    #[tokio::test]
    async fn test_begin_text_claims_the_call_before_it_runs() {
        let wizard = service();
        let user = UserId(9);
        wizard.start(user).await;
        wizard.handle_callback(user, "gen_pyrogram").await;
        wizard.handle_text(user, "12345").await;
        wizard.handle_text(user, "abc").await;

        let TextStep::Login(call) = wizard.begin_text(user, "+15550001111") else {
            panic!("phone number should start a login call");
        };
        assert_eq!(call.user_id(), user);
        assert!(matches!(wizard.begin_text(user, "12345"), TextStep::Reply(WizardReply::Busy)));

        let reply = wizard.run_login(call).await;
        assert!(matches!(reply, Some(WizardReply::CodeRequestFailed { .. })));
        assert!(wizard.store().is_empty());
    }
}
