//! # Unified Application Configuration
//!
//! This module provides a centralized configuration system that consolidates
//! all application settings into a single, structured configuration object.
//! It supports loading from environment variables, validation, and provides
//! a clean interface for accessing configuration throughout the application.

use crate::errors::{AppError, AppResult};
use crate::observability_config::ObservabilityConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Bot-specific configuration settings
#[derive(Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Telegram bot token
    pub token: String,
    /// HTTP client timeout in seconds
    pub http_timeout_secs: u64,
    /// Upper bound in seconds on one MTProto login call
    pub login_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            http_timeout_secs: 30,
            login_timeout_secs: 120,
        }
    }
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"[REDACTED]")
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("login_timeout_secs", &self.login_timeout_secs)
            .finish()
    }
}

impl BotConfig {
    /// Validate bot configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.token.trim().is_empty() {
            return Err(AppError::Config("Bot token cannot be empty".to_string()));
        }

        let Some((bot_id, secret)) = self.token.split_once(':') else {
            return Err(AppError::Config(
                "Bot token format is invalid. Expected format: 'bot_id:bot_token'".to_string(),
            ));
        };

        if secret.contains(':') {
            return Err(AppError::Config(
                "Bot token format is invalid. Expected format: 'bot_id:bot_token'".to_string(),
            ));
        }

        if bot_id.parse::<u64>().is_err() {
            return Err(AppError::Config(
                "Bot token bot ID must be numeric".to_string(),
            ));
        }

        if secret.len() < 20 {
            return Err(AppError::Config(
                "Bot token appears to be too short. Please verify it's a valid token".to_string(),
            ));
        }

        if self.http_timeout_secs == 0 {
            return Err(AppError::Config("HTTP timeout cannot be 0".to_string()));
        }

        if self.http_timeout_secs > 300 {
            return Err(AppError::Config(
                "HTTP timeout cannot be greater than 300 seconds".to_string(),
            ));
        }

        if self.login_timeout_secs == 0 || self.login_timeout_secs > 600 {
            return Err(AppError::Config(
                "Login timeout must be between 1 and 600 seconds".to_string(),
            ));
        }

        Ok(())
    }
}

/// Keep-alive server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port serving `/`, `/health/*` and `/metrics`
    pub port: u16,
    /// Whether to allow privileged ports (< 1024)
    pub allow_privileged_ports: bool,
    /// Requests per minute accepted from a single peer address
    pub rate_limit_per_minute: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            allow_privileged_ports: false,
            rate_limit_per_minute: 120,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.port == 0 {
            return Err(AppError::Config("Server port cannot be 0".to_string()));
        }

        if !self.allow_privileged_ports && self.port < 1024 {
            return Err(AppError::Config(format!(
                "Port {} is privileged. Set ALLOW_PRIVILEGED_PORTS=true or use port >= 1024",
                self.port
            )));
        }

        if self.rate_limit_per_minute == 0 {
            return Err(AppError::Config(
                "Rate limit per minute cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Unified application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Bot configuration
    pub bot: BotConfig,
    /// Server configuration
    pub server: ServerConfig,
    /// Observability configuration
    pub observability: ObservabilityConfig,
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    message: &str,
) -> AppResult<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} {}", key, message))),
        None => Ok(default),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        Ok(Self {
            observability: ObservabilityConfig::from_env(),
            ..config
        })
    }

    /// Load the bot and server sections through `lookup`
    ///
    /// `TELEGRAM_BOT_TOKEN` wins over the legacy `BOT_TOKEN` name.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let mut config = Self::default();

        config.bot.token = lookup("TELEGRAM_BOT_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .or_else(|| lookup("BOT_TOKEN"))
            .ok_or_else(|| {
                AppError::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
            })?;
        config.bot.http_timeout_secs = parse_var(
            &lookup,
            "HTTP_CLIENT_TIMEOUT_SECS",
            config.bot.http_timeout_secs,
            "must be a valid number",
        )?;
        config.bot.login_timeout_secs = parse_var(
            &lookup,
            "LOGIN_TIMEOUT_SECS",
            config.bot.login_timeout_secs,
            "must be a valid number",
        )?;

        config.server.port = parse_var(
            &lookup,
            "PORT",
            config.server.port,
            "must be a valid port number",
        )?;
        config.server.allow_privileged_ports = lookup("ALLOW_PRIVILEGED_PORTS")
            .map(|value| value.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        config.server.rate_limit_per_minute = parse_var(
            &lookup,
            "HTTP_RATE_LIMIT_PER_MINUTE",
            config.server.rate_limit_per_minute,
            "must be a valid number",
        )?;

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.bot.validate()?;
        self.server.validate()?;
        self.observability.validate().map_err(AppError::Config)?;
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: bot_token=[REDACTED], http_timeout_secs={}, login_timeout_secs={}, port={}, environment={}, metrics_enabled={}",
            self.bot.http_timeout_secs,
            self.bot.login_timeout_secs,
            self.server.port,
            self.observability.environment,
            self.observability.enable_metrics_export
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_config_validation() {
        let mut config = BotConfig::default();

        // Invalid: empty token
        assert!(config.validate().is_err());

        // Invalid: malformed token
        config.token = "invalid-token".to_string();
        assert!(config.validate().is_err());

        // Invalid: short token
        config.token = "123:short".to_string();
        assert!(config.validate().is_err());

        // Valid token format
        config.token = "123456789:AAFakeTokenForTestingPurposes1234567890".to_string();
        assert!(config.validate().is_ok());

        // Invalid: zero timeout
        config.http_timeout_secs = 0;
        assert!(config.validate().is_err());
        config.http_timeout_secs = 30;

        // Invalid: login timeout out of range
        config.login_timeout_secs = 0;
        assert!(config.validate().is_err());
        config.login_timeout_secs = 601;
        assert!(config.validate().is_err());
        config.login_timeout_secs = 120;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_config_validation() {
        let mut config = ServerConfig::default();
        assert!(config.validate().is_ok());

        config.port = 0;
        assert!(config.validate().is_err());

        // Invalid: privileged port without permission
        config.port = 80;
        assert!(config.validate().is_err());

        // Valid: privileged port with permission
        config.allow_privileged_ports = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bot_config_debug_redacts_token() {
        let config = BotConfig {
            token: "123456789:AAFakeTokenForTestingPurposes1234567890".to_string(),
            http_timeout_secs: 30,
            login_timeout_secs: 120,
        };
        assert!(!format!("{:?}", config).contains("AAFake"));
    }
}
