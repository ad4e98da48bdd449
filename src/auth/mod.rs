//! # Login Backend
//!
//! The wizard talks to the Telegram login flow through two traits:
//!
//! - [`AuthService`] starts an attempt by asking Telegram to send a login code.
//! - [`LoginAttempt`] is the handle to that attempt; it accepts the code, an
//!   optional 2FA password, and must be released once the wizard is done with it.
//!
//! The production implementation lives in [`grammers_backend`].

pub mod grammers_backend;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::dialogue::Credentials;

pub use grammers_backend::GrammersAuthService;

/// Errors reported by the login backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The login code was rejected
    InvalidCode,
    /// The 2FA password was rejected
    InvalidPassword,
    /// The phone number has no Telegram account yet
    SignUpRequired,
    /// Connection to Telegram failed or dropped
    Transport(String),
    /// Telegram refused the request (bad phone, flood wait, expired code, ...)
    Rejected(String),
    /// No answer from Telegram within the login timeout
    Timeout(Duration),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCode => write!(f, "the login code is invalid or has expired"),
            AuthError::InvalidPassword => write!(f, "the 2FA password is incorrect"),
            AuthError::SignUpRequired => {
                write!(f, "this phone number is not registered on Telegram")
            }
            AuthError::Transport(msg) => write!(f, "connection error: {}", msg),
            AuthError::Rejected(msg) => write!(f, "{}", msg),
            AuthError::Timeout(limit) => {
                write!(f, "no response from Telegram within {}s", limit.as_secs())
            }
        }
    }
}

impl std::error::Error for AuthError {}

/// Everything needed to serialize an authorized login into a session string
#[derive(Clone, PartialEq, Eq)]
pub struct SessionMaterial {
    pub dc_id: i32,
    pub user_id: i64,
    pub auth_key: [u8; 256],
    pub api_id: i32,
    pub test_mode: bool,
    pub is_bot: bool,
}

impl fmt::Debug for SessionMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionMaterial")
            .field("dc_id", &self.dc_id)
            .field("user_id", &self.user_id)
            .field("auth_key", &"<redacted>")
            .field("api_id", &self.api_id)
            .field("test_mode", &self.test_mode)
            .field("is_bot", &self.is_bot)
            .finish()
    }
}

/// Result of submitting the login code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeOutcome {
    /// The account is now authorized
    Authorized(SessionMaterial),
    /// The account has a 2FA password; submit it next
    PasswordRequired { hint: Option<String> },
}

/// Starts login attempts against Telegram
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Connect with the user's API credentials and ask Telegram to deliver a
    /// login code to `credentials.phone_number`.
    async fn request_code(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn LoginAttempt>, AuthError>;
}

/// An in-progress login attempt
#[async_trait]
pub trait LoginAttempt: Send {
    async fn submit_code(&mut self, code: &str) -> Result<CodeOutcome, AuthError>;

    /// Only valid after [`submit_code`](LoginAttempt::submit_code) returned
    /// [`CodeOutcome::PasswordRequired`].
    async fn submit_password(&mut self, password: &str) -> Result<SessionMaterial, AuthError>;

    /// Disconnect from Telegram. Best effort; failures are logged by the implementation.
    async fn release(self: Box<Self>);
}
