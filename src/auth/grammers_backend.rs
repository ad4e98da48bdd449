//! MTProto login backend built on `grammers-client`.
//!
//! Each attempt owns its own client with a throwaway in-memory session, so the
//! only durable output is the [`SessionMaterial`] handed back on success.

use async_trait::async_trait;
use grammers_client::types::{LoginToken, PasswordToken};
use grammers_client::{Client, Config, InitParams, SignInError};
use grammers_session::Session;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{AuthError, AuthService, CodeOutcome, LoginAttempt, SessionMaterial};
use crate::dialogue::Credentials;

/// Login backend connecting to Telegram's production data centres
#[derive(Debug, Clone, Default)]
pub struct GrammersAuthService {
    params: GrammersParams,
}

/// Client identification sent to Telegram when connecting
#[derive(Debug, Clone)]
struct GrammersParams {
    device_model: String,
    app_version: String,
}

impl Default for GrammersParams {
    fn default() -> Self {
        Self {
            device_model: "sessiongen-bot".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[async_trait]
impl AuthService for GrammersAuthService {
    async fn request_code(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn LoginAttempt>, AuthError> {
        let start = Instant::now();

        let client = Client::connect(Config {
            session: Session::new(),
            api_id: credentials.api_id,
            api_hash: credentials.api_hash.clone(),
            params: InitParams {
                device_model: self.params.device_model.clone(),
                app_version: self.params.app_version.clone(),
                ..Default::default()
            },
        })
        .await
        .map_err(|e| AuthError::Transport(e.to_string()))?;

        debug!(
            api_id = credentials.api_id,
            connect_ms = start.elapsed().as_millis(),
            "Connected to Telegram"
        );

        let token = client
            .request_login_code(&credentials.phone_number)
            .await
            .map_err(|e| AuthError::Rejected(e.to_string()))?;

        info!(
            api_id = credentials.api_id,
            duration_ms = start.elapsed().as_millis(),
            "Login code requested"
        );

        Ok(Box::new(GrammersLoginAttempt {
            client,
            api_id: credentials.api_id,
            login_token: Some(token),
            password_token: None,
        }))
    }
}

/// In-progress login holding the connected client and the server-side tokens
pub struct GrammersLoginAttempt {
    client: Client,
    api_id: i32,
    login_token: Option<LoginToken>,
    password_token: Option<PasswordToken>,
}

impl GrammersLoginAttempt {
    /// Read the authorization out of the client's session after a successful sign-in
    fn session_material(&self) -> Result<SessionMaterial, AuthError> {
        let session = self.client.session();
        let user = session.get_user().ok_or_else(|| {
            AuthError::Rejected("sign-in finished without an authorized user".to_string())
        })?;
        let auth_key = session.dc_auth_key(user.dc).ok_or_else(|| {
            AuthError::Rejected(format!("no authorization key for DC {}", user.dc))
        })?;

        Ok(SessionMaterial {
            dc_id: user.dc,
            user_id: user.id,
            auth_key,
            api_id: self.api_id,
            test_mode: false,
            is_bot: user.bot,
        })
    }
}

fn map_sign_in_error(err: SignInError) -> AuthError {
    match err {
        SignInError::InvalidCode => AuthError::InvalidCode,
        SignInError::InvalidPassword => AuthError::InvalidPassword,
        SignInError::PasswordRequired(_) => {
            AuthError::Rejected("a 2FA password is required".to_string())
        }
        SignInError::SignUpRequired { .. } => AuthError::SignUpRequired,
        other => AuthError::Rejected(other.to_string()),
    }
}

#[async_trait]
impl LoginAttempt for GrammersLoginAttempt {
    async fn submit_code(&mut self, code: &str) -> Result<CodeOutcome, AuthError> {
        let token = self
            .login_token
            .take()
            .ok_or_else(|| AuthError::Rejected("the login code was already used".to_string()))?;

        match self.client.sign_in(&token, code).await {
            Ok(_) => self.session_material().map(CodeOutcome::Authorized),
            Err(SignInError::PasswordRequired(password_token)) => {
                let hint = password_token.hint().map(str::to_string);
                self.password_token = Some(password_token);
                Ok(CodeOutcome::PasswordRequired { hint })
            }
            Err(e) => Err(map_sign_in_error(e)),
        }
    }

    async fn submit_password(&mut self, password: &str) -> Result<SessionMaterial, AuthError> {
        let token = self.password_token.take().ok_or_else(|| {
            AuthError::Rejected("no password was requested for this login".to_string())
        })?;

        self.client
            .check_password(token, password)
            .await
            .map_err(map_sign_in_error)?;

        self.session_material()
    }

    async fn release(self: Box<Self>) {
        // Dropping the last client handle closes the MTProto connection.
        if self.login_token.is_some() || self.password_token.is_some() {
            warn!(api_id = self.api_id, "Releasing login attempt before sign-in finished");
        } else {
            debug!(api_id = self.api_id, "Releasing login attempt");
        }
        drop(self.client);
    }
}
