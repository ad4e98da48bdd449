//! Metrics collection and the keep-alive HTTP server.
//!
//! This module provides:
//! - Rate limiting for HTTP requests
//! - Bearer authentication for the metrics endpoint
//! - The keep-alive server (`/`, `/health/*`, `/metrics`)
//! - Wizard and Telegram metrics recording functions

use anyhow::Result;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::dialogue::WizardStep;
use crate::wizard::WizardService;

/// Body served on `/`; uptime monitors look for it
pub const KEEP_ALIVE_BODY: &str = "Bot is running!";

/// Simple rate limiter for HTTP requests
#[derive(Debug)]
pub struct RateLimiter {
    requests: Mutex<HashMap<String, Vec<Instant>>>,
    max_requests: u32,
    window_secs: u64,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
            max_requests,
            window_secs,
        }
    }

    /// Check if request is allowed for the given IP
    pub fn is_allowed(&self, ip: &str) -> bool {
        let now = Instant::now();
        let window = Duration::from_secs(self.window_secs);

        let mut requests = self.requests.lock();

        // Drop timestamps outside the window, and peers left with none
        requests.retain(|_, times| {
            times.retain(|&time| now.duration_since(time) < window);
            !times.is_empty()
        });

        let client_requests = requests.entry(ip.to_string()).or_default();
        if client_requests.len() >= self.max_requests as usize {
            return false;
        }

        client_requests.push(now);
        true
    }

    /// Number of peers with requests inside the current window
    pub fn tracked_peers(&self) -> usize {
        self.requests.lock().len()
    }
}

/// Check a bearer token against `METRICS_AUTH_TOKEN`
///
/// Always passes when no token is configured.
pub fn check_auth<B>(req: &hyper::Request<B>) -> bool {
    let expected_token = match std::env::var("METRICS_AUTH_TOKEN") {
        Ok(token) if !token.is_empty() => token,
        _ => return true,
    };

    req.headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected_token)
}

/// Initialize metrics collection with the Prometheus recorder
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    tracing::info!("Metrics collection initialized");
    Ok(handle)
}

/// Response for a single keep-alive server request
pub fn route(
    method: &hyper::Method,
    path: &str,
    authorized: bool,
    metrics_handle: Option<&PrometheusHandle>,
    wizard: &WizardService,
) -> hyper::Response<String> {
    match (method, path) {
        (&hyper::Method::GET | &hyper::Method::HEAD, "/") => {
            hyper::Response::new(KEEP_ALIVE_BODY.to_string())
        }
        (&hyper::Method::GET, "/health/live") => hyper::Response::new("OK".to_string()),
        (&hyper::Method::GET, "/health/ready") => {
            let body = super::health_checks::readiness_report(wizard).to_string();
            let mut response = hyper::Response::new(body);
            response.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                hyper::header::HeaderValue::from_static("application/json"),
            );
            response
        }
        (&hyper::Method::GET, "/metrics") => match metrics_handle {
            Some(_) if !authorized => {
                let mut response = hyper::Response::new("Unauthorized".to_string());
                *response.status_mut() = hyper::StatusCode::UNAUTHORIZED;
                response.headers_mut().insert(
                    "www-authenticate",
                    hyper::header::HeaderValue::from_static("Bearer"),
                );
                response
            }
            Some(handle) => hyper::Response::new(handle.render()),
            None => not_found(),
        },
        _ => not_found(),
    }
}

fn not_found() -> hyper::Response<String> {
    let mut response = hyper::Response::new("Not Found".to_string());
    *response.status_mut() = hyper::StatusCode::NOT_FOUND;
    response
}

/// Start the keep-alive server answering uptime pings, health checks and scrapes
pub async fn start_keep_alive_server(
    config: &ServerConfig,
    metrics_handle: Option<PrometheusHandle>,
    wizard: Arc<WizardService>,
) -> Result<SocketAddr> {
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.port);

    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_per_minute, 60));

    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(addr = %local_addr, "Keep-alive server listening");

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let metrics_handle = metrics_handle.clone();
                    let rate_limiter = rate_limiter.clone();
                    let wizard = wizard.clone();

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = hyper::service::service_fn(
                            move |req: hyper::Request<hyper::body::Incoming>| {
                                let metrics_handle = metrics_handle.clone();
                                let rate_limiter = rate_limiter.clone();
                                let wizard = wizard.clone();
                                let peer_ip = peer_addr.ip().to_string();
                                async move {
                                    if !rate_limiter.is_allowed(&peer_ip) {
                                        let mut response =
                                            hyper::Response::new("Rate limit exceeded".to_string());
                                        *response.status_mut() =
                                            hyper::StatusCode::TOO_MANY_REQUESTS;
                                        return Ok::<_, std::convert::Infallible>(response);
                                    }

                                    let start = Instant::now();
                                    let response = route(
                                        req.method(),
                                        req.uri().path(),
                                        check_auth(&req),
                                        metrics_handle.as_ref(),
                                        &wizard,
                                    );
                                    record_request_metrics(
                                        req.method().as_str(),
                                        response.status().as_u16(),
                                        start.elapsed(),
                                    );
                                    Ok(response)
                                }
                            },
                        );

                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await
                        {
                            crate::errors::error_logging::log_network_error(
                                &err,
                                "serve_http_connection",
                                Some(&peer_addr.to_string()),
                                None,
                            );
                        }
                    });
                }
                Err(e) => {
                    crate::errors::error_logging::log_network_error(
                        &e,
                        "accept_tcp_connection",
                        Some(&addr.to_string()),
                        None,
                    );
                }
            }
        }
    });

    Ok(local_addr)
}

/// Login backend call being measured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    RequestCode,
    SubmitCode,
    SubmitPassword,
}

impl AuthStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStage::RequestCode => "request_code",
            AuthStage::SubmitCode => "submit_code",
            AuthStage::SubmitPassword => "submit_password",
        }
    }
}

/// How a wizard session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardOutcome {
    /// A session string was delivered
    Completed,
    /// The user cancelled
    Cancelled,
    /// The user started a new wizard over this one
    Replaced,
    /// A login backend call failed
    Failed(AuthStage),
}

impl WizardOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WizardOutcome::Completed => "completed",
            WizardOutcome::Cancelled => "cancelled",
            WizardOutcome::Replaced => "replaced",
            WizardOutcome::Failed(_) => "failed",
        }
    }
}

/// Record a wizard start
pub fn record_wizard_started() {
    metrics::counter!("wizard_started_total").increment(1);
}

/// Record how a wizard ended, the step it reached, and how long it ran
pub fn record_wizard_finished(outcome: WizardOutcome, last_step: WizardStep, duration: Duration) {
    let stage = match outcome {
        WizardOutcome::Failed(stage) => stage.as_str(),
        _ => "none",
    };
    metrics::counter!(
        "wizard_finished_total",
        "outcome" => outcome.as_str(),
        "failed_stage" => stage,
        "last_step" => last_step.as_str()
    )
    .increment(1);
    metrics::histogram!("wizard_duration_seconds", "outcome" => outcome.as_str())
        .record(duration.as_secs_f64());

    tracing::debug!(
        outcome = outcome.as_str(),
        failed_stage = stage,
        last_step = last_step.as_str(),
        duration_secs = duration.as_secs(),
        "Wizard metrics recorded"
    );
}

/// Set the number of active wizards
pub fn update_active_wizards(count: usize) {
    metrics::gauge!("wizard_active_sessions").set(count as f64);
}

/// Record a login backend call
pub fn record_auth_call_metrics(stage: AuthStage, success: bool, duration: Duration) {
    metrics::counter!(
        "auth_calls_total",
        "stage" => stage.as_str(),
        "result" => if success { "success" } else { "failure" }
    )
    .increment(1);
    metrics::histogram!("auth_call_duration_seconds", "stage" => stage.as_str())
        .record(duration.as_secs_f64());
}

/// Record keep-alive server request metrics
pub fn record_request_metrics(method: &str, status: u16, duration: Duration) {
    let method = method.to_string();
    let status = status.to_string();
    metrics::counter!("http_requests_total", "method" => method, "status" => status).increment(1);
    metrics::histogram!("http_request_duration_seconds").record(duration.as_secs_f64());
}

/// Record Telegram message processing metrics
pub fn record_telegram_message(message_type: &str) {
    let message_type = message_type.to_string();
    metrics::counter!("telegram_messages_total", "type" => message_type).increment(1);
}

/// Record error rate metrics
pub fn record_error_metrics(error_type: &str, component: &str) {
    let error_type = error_type.to_string();
    let component = component.to_string();
    metrics::counter!("errors_total", "type" => error_type, "component" => component).increment(1);
}

/// Record health check metrics
pub fn record_health_check_metrics(check_type: &str, success: bool, duration: Duration) {
    let check_type = check_type.to_string();
    metrics::counter!(
        "health_checks_total",
        "type" => check_type.clone(),
        "result" => if success { "success" } else { "failure" }
    )
    .increment(1);
    metrics::histogram!("health_check_duration_seconds", "type" => check_type.clone())
        .record(duration.as_secs_f64());
    metrics::gauge!("health_check_status", "type" => check_type).set(if success {
        1.0
    } else {
        0.0
    });
}
