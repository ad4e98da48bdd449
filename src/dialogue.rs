//! Session wizard dialogue module holding the per-user conversation state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use teloxide::types::UserId;

use crate::auth::LoginAttempt;

/// Callback data prefix shared by every wizard button
pub const CALLBACK_PREFIX: &str = "gen_";
/// Callback data for the cancel button
pub const CALLBACK_CANCEL: &str = "gen_cancel";

/// Represents the step a user is at in the session wizard
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardStep {
    #[default]
    ChoosingLibrary,
    AwaitingApiId,
    AwaitingApiHash,
    AwaitingPhone,
    AwaitingCode,
    AwaitingPassword,
    Done,
}

impl WizardStep {
    /// Stable snake_case name used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            WizardStep::ChoosingLibrary => "choosing_library",
            WizardStep::AwaitingApiId => "awaiting_api_id",
            WizardStep::AwaitingApiHash => "awaiting_api_hash",
            WizardStep::AwaitingPhone => "awaiting_phone",
            WizardStep::AwaitingCode => "awaiting_code",
            WizardStep::AwaitingPassword => "awaiting_password",
            WizardStep::Done => "done",
        }
    }

    /// Whether `next` directly follows this step. `Done` follows the code step
    /// for accounts without 2FA and the password step otherwise.
    pub fn leads_to(&self, next: WizardStep) -> bool {
        use WizardStep::*;
        matches!(
            (self, next),
            (ChoosingLibrary, AwaitingApiId)
                | (AwaitingApiId, AwaitingApiHash)
                | (AwaitingApiHash, AwaitingPhone)
                | (AwaitingPhone, AwaitingCode)
                | (AwaitingCode, AwaitingPassword)
                | (AwaitingCode, Done)
                | (AwaitingPassword, Done)
        )
    }
}

/// Client library the generated session string is meant for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionLibrary {
    Pyrogram,
    Telethon,
}

impl SessionLibrary {
    pub const ALL: [SessionLibrary; 2] = [SessionLibrary::Pyrogram, SessionLibrary::Telethon];

    /// Human readable library name
    pub fn display_name(&self) -> &'static str {
        match self {
            SessionLibrary::Pyrogram => "Pyrogram",
            SessionLibrary::Telethon => "Telethon",
        }
    }

    /// Inline button payload selecting this library
    pub fn callback_data(&self) -> &'static str {
        match self {
            SessionLibrary::Pyrogram => "gen_pyrogram",
            SessionLibrary::Telethon => "gen_telethon",
        }
    }

    /// Parse the inline button payload back into a library
    pub fn from_callback_data(data: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|lib| lib.callback_data() == data)
    }
}

impl fmt::Display for SessionLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Credentials accumulated while the wizard advances
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_id: i32,
    pub api_hash: String,
    pub phone_number: String,
}

// api_hash and phone are secrets as far as logs are concerned
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .field("phone_number", &"<redacted>")
            .finish()
    }
}

/// Transient wizard state for a single user
pub struct WizardSession {
    pub user_id: UserId,
    pub step: WizardStep,
    pub library: Option<SessionLibrary>,
    pub credentials: Credentials,
    pub pending_login: Option<Box<dyn LoginAttempt>>,
    /// Identifies this session instance; a replaced or cancelled session never
    /// shares a generation with its successor.
    pub generation: u64,
    pub call_in_flight: bool,
    pub started_at: DateTime<Utc>,
}

impl WizardSession {
    /// Create a session at the library choice step
    pub fn new(user_id: UserId, generation: u64) -> Self {
        Self {
            user_id,
            step: WizardStep::ChoosingLibrary,
            library: None,
            credentials: Credentials::default(),
            pending_login: None,
            generation,
            call_in_flight: false,
            started_at: Utc::now(),
        }
    }

    /// Move to the next step. Returns false (and leaves the step alone) when
    /// `next` does not directly follow the current step.
    pub fn advance(&mut self, next: WizardStep) -> bool {
        if !self.step.leads_to(next) {
            return false;
        }
        self.step = next;
        true
    }

    /// Time elapsed since the wizard was started
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

impl fmt::Debug for WizardSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WizardSession")
            .field("user_id", &self.user_id)
            .field("step", &self.step)
            .field("library", &self.library)
            .field("credentials", &self.credentials)
            .field("has_pending_login", &self.pending_login.is_some())
            .field("generation", &self.generation)
            .field("call_in_flight", &self.call_in_flight)
            .field("started_at", &self.started_at)
            .finish()
    }
}
