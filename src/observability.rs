//! Observability module for centralized metrics, tracing, and logging setup.
//!
//! This module provides:
//! - Structured logging with configurable levels and formats
//! - Metrics collection and Prometheus export
//! - The keep-alive HTTP server with health check endpoints

pub mod health_checks;
pub mod metrics;
pub mod tracing_mod;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::observability_config::ObservabilityConfig;

pub use health_checks::{
    check_bot_token_health, readiness_report, start_health_metrics_recorder,
};
pub use metrics::{
    record_auth_call_metrics, record_error_metrics, record_health_check_metrics,
    record_request_metrics, record_telegram_message, record_wizard_finished,
    record_wizard_started, start_keep_alive_server, update_active_wizards, AuthStage,
    WizardOutcome,
};
pub use tracing_mod::{auth_span, init_tracing_with_config, telegram_span};

/// Initialize logging and, when enabled, the Prometheus recorder
///
/// Returns the handle the keep-alive server renders `/metrics` from.
pub fn init_observability(config: &ObservabilityConfig) -> Result<Option<PrometheusHandle>> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    init_tracing_with_config(config)?;

    let metrics_handle = if config.enable_metrics_export {
        Some(metrics::init_metrics()?)
    } else {
        tracing::info!("Metrics export disabled");
        None
    };

    tracing::info!(
        environment = %config.environment,
        metrics_enabled = config.enable_metrics_export,
        "Observability stack initialized successfully"
    );
    Ok(metrics_handle)
}
