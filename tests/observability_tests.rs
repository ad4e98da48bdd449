//! # Observability Tests
//!
//! Keep-alive server routing, health checks and metric recording.

mod test_helpers;

use anyhow::Result;
use sessiongen_bot::config::ServerConfig;
use sessiongen_bot::dialogue::WizardStep;
use sessiongen_bot::observability::{self, metrics, AuthStage, WizardOutcome};
use std::time::Duration;
use teloxide::types::UserId;
use test_helpers::{setup_wizard, MockAuthService};

#[tokio::test]
async fn test_routes_without_metrics() -> Result<()> {
    let (wizard, _stats) = setup_wizard(MockAuthService::authorizing());
    let get = hyper::Method::GET;

    let root = metrics::route(&get, "/", true, None, &wizard);
    assert_eq!(root.status(), hyper::StatusCode::OK);
    assert_eq!(root.body(), "Bot is running!");

    let live = metrics::route(&get, "/health/live", true, None, &wizard);
    assert_eq!(live.body(), "OK");

    // No recorder installed, so no metrics endpoint
    let scrape = metrics::route(&get, "/metrics", true, None, &wizard);
    assert_eq!(scrape.status(), hyper::StatusCode::NOT_FOUND);

    let unknown = metrics::route(&get, "/admin", true, None, &wizard);
    assert_eq!(unknown.status(), hyper::StatusCode::NOT_FOUND);

    let post = metrics::route(&hyper::Method::POST, "/", true, None, &wizard);
    assert_eq!(post.status(), hyper::StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_readiness_reports_active_wizards() -> Result<()> {
    let (wizard, _stats) = setup_wizard(MockAuthService::authorizing());
    wizard.start(UserId(1)).await;
    wizard.start(UserId(2)).await;

    let ready = metrics::route(&hyper::Method::GET, "/health/ready", true, None, &wizard);
    assert_eq!(ready.status(), hyper::StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(ready.body())?;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["active_wizards"], 2);
    Ok(())
}

#[tokio::test]
async fn test_keep_alive_server_end_to_end() -> Result<()> {
    let (wizard, _stats) = setup_wizard(MockAuthService::authorizing());
    let config = ServerConfig {
        port: 0,
        ..ServerConfig::default()
    };

    let addr = observability::start_keep_alive_server(&config, None, wizard).await?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let root = client.get(format!("http://127.0.0.1:{}/", addr.port())).send().await?;
    assert_eq!(root.status(), reqwest::StatusCode::OK);
    assert_eq!(root.text().await?, "Bot is running!");

    let missing = client.get(format!("http://127.0.0.1:{}/missing", addr.port())).send().await?;
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    Ok(())
}

#[test]
fn test_rate_limiter_per_peer() {
    let limiter = metrics::RateLimiter::new(3, 60);
    for _ in 0..3 {
        assert!(limiter.is_allowed("192.0.2.1"));
    }
    assert!(!limiter.is_allowed("192.0.2.1"));
    assert!(limiter.is_allowed("192.0.2.2"));
}

#[test]
fn test_bot_token_health() {
    assert!(observability::check_bot_token_health("123456:ABC-DEF1234ghIkl-zyx57W2v1u123ew11").is_ok());
    assert!(observability::check_bot_token_health("invalid_token").is_err());
    assert!(observability::check_bot_token_health("").is_err());
}

/// Recording without an installed recorder is a no-op and must not panic
#[test]
fn test_metrics_recording() {
    observability::record_wizard_started();
    observability::record_wizard_finished(
        WizardOutcome::Failed(AuthStage::SubmitCode),
        WizardStep::AwaitingCode,
        Duration::from_secs(12),
    );
    observability::record_auth_call_metrics(AuthStage::RequestCode, true, Duration::from_millis(300));
    observability::update_active_wizards(3);
    observability::record_telegram_message("text");
    observability::record_request_metrics("GET", 200, Duration::from_millis(2));
    observability::record_health_check_metrics("telegram_bot", true, Duration::from_millis(1));
    observability::record_error_metrics("network", "telegram");
}

#[test]
fn test_span_creation() {
    let _telegram_span = observability::telegram_span("test_operation", Some(12345));
    let _auth_span = observability::auth_span("submit_code", 12345);
}
