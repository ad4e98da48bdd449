//! # Observability Configuration
//!
//! Environment-specific settings for logging and metrics.

use std::env;

/// Observability configuration for different environments
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Environment name (development, staging, production)
    pub environment: String,
    /// Default log level for this crate when `RUST_LOG` does not override it
    pub log_level: String,
    /// Log output format: "json" or "pretty"
    pub log_format: String,
    /// Whether to install the Prometheus recorder and serve `/metrics`
    pub enable_metrics_export: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
            log_format: "json".to_string(),
            enable_metrics_export: true,
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl ObservabilityConfig {
    /// Load configuration from environment variables
    ///
    /// `ENVIRONMENT` picks a preset; the other variables override its fields.
    pub fn from_env() -> Self {
        let mut config = Self::for_environment(env::var("ENVIRONMENT").ok().as_deref());

        if let Ok(level) = env::var("OBSERVABILITY_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            config.log_format = format;
        }
        if let Ok(enabled) = env::var("ENABLE_METRICS_EXPORT") {
            config.enable_metrics_export = enabled.parse().unwrap_or(true);
        }
        config
    }

    /// Preset for an `ENVIRONMENT` value; JSON logs unless it is `development`
    pub fn for_environment(environment: Option<&str>) -> Self {
        match environment {
            Some("development") => presets::development(),
            Some("production") | None => presets::production(),
            Some(other) => Self {
                environment: other.to_string(),
                ..Self::default()
            },
        }
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Whether logs should use the human-readable formatter
    pub fn use_pretty_logs(&self) -> bool {
        self.is_development() || self.log_format == "pretty"
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(format!("Invalid log level: {}", self.log_level));
        }

        if self.log_format != "json" && self.log_format != "pretty" {
            return Err(format!("Invalid log format: {}", self.log_format));
        }

        Ok(())
    }
}

/// Environment-specific configuration presets
pub mod presets {
    use super::ObservabilityConfig;

    /// Development configuration with verbose, readable logs
    pub fn development() -> ObservabilityConfig {
        ObservabilityConfig {
            environment: "development".to_string(),
            log_level: "debug".to_string(),
            log_format: "pretty".to_string(),
            ..Default::default()
        }
    }

    /// Production configuration with JSON logs
    pub fn production() -> ObservabilityConfig {
        ObservabilityConfig {
            environment: "production".to_string(),
            log_level: "info".to_string(),
            log_format: "json".to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.environment, "development");
        assert_eq!(config.log_level, "info");
        assert!(config.enable_metrics_export);
        assert!(config.use_pretty_logs());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ObservabilityConfig::default();
        assert!(config.validate().is_ok());

        config.log_level = "verbose".to_string();
        assert!(config.validate().is_err());

        config.log_level = "warn".to_string();
        config.log_format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_presets() {
        let prod = presets::production();
        assert!(prod.is_production());
        assert!(!prod.use_pretty_logs());
        assert!(prod.validate().is_ok());

        let dev = presets::development();
        assert!(dev.is_development());
        assert!(dev.validate().is_ok());
    }

    #[test]
    fn test_json_logs_unless_development() {
        let unset = ObservabilityConfig::for_environment(None);
        assert_eq!(unset.log_format, "json");
        assert!(!unset.use_pretty_logs());

        let staging = ObservabilityConfig::for_environment(Some("staging"));
        assert_eq!(staging.environment, "staging");
        assert!(!staging.use_pretty_logs());

        assert!(ObservabilityConfig::for_environment(Some("development")).use_pretty_logs());
    }
}
