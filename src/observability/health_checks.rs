//! Health check functionality module.
//!
//! This module provides:
//! - Bot token validation checks
//! - The readiness report served on `/health/ready`
//! - A background recorder for health check metrics

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::wizard::WizardService;

/// Check Telegram bot token validity
///
/// Format check only; no API call is made.
pub fn check_bot_token_health(token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(anyhow::anyhow!("Bot token is empty"));
    }

    // Telegram bot tokens look like `<bot id>:<secret>`
    let Some((bot_id, secret)) = token.split_once(':') else {
        return Err(anyhow::anyhow!("Bot token format is invalid"));
    };
    if bot_id.is_empty() || !bot_id.bytes().all(|b| b.is_ascii_digit()) || secret.is_empty() {
        return Err(anyhow::anyhow!("Bot token format is invalid"));
    }

    tracing::debug!("Bot token health check passed");
    Ok(())
}

/// JSON body for `/health/ready`
pub fn readiness_report(wizard: &WizardService) -> serde_json::Value {
    json!({
        "status": "ready",
        "active_wizards": wizard.active_sessions(),
    })
}

/// Start a background task to periodically record health check metrics
pub fn start_health_metrics_recorder(
    bot_token: Option<String>,
    wizard: Arc<WizardService>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));

        loop {
            interval.tick().await;

            if let Some(token) = &bot_token {
                let check_start = Instant::now();
                let bot_healthy = check_bot_token_health(token).is_ok();
                super::metrics::record_health_check_metrics(
                    "telegram_bot",
                    bot_healthy,
                    check_start.elapsed(),
                );
            }

            super::metrics::update_active_wizards(wizard.active_sessions());
        }
    })
}
