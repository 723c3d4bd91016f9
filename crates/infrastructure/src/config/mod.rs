//! Application configuration
//!
//! Split into focused sub-modules:
//! - `service`: service identity for telemetry
//! - `chaos`: the fault injection switch and profile
//!
//! Telemetry settings reuse [`TelemetryConfig`] directly.

mod chaos;
mod service;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use chaos::ChaosAppConfig;
pub use service::ServiceConfig;

use crate::chaos::{ChaosConfigError, FaultProfile};
pub use crate::telemetry::TelemetryConfig;

/// Name of the optional configuration file, without extension
pub const CONFIG_FILE: &str = "faultline";

/// Prefix of environment overrides, e.g. `FAULTLINE_CHAOS__ENABLED=true`
pub const ENV_PREFIX: &str = "FAULTLINE";

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Service identity
    #[serde(default)]
    pub service: ServiceConfig,

    /// Fault injection
    #[serde(default)]
    pub chaos: ChaosAppConfig,

    /// Logging, metrics, and tracing
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from defaults, `faultline.toml`, and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = Self::defaults()?
            // Load from file if exists
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            // Override with environment variables (e.g., FAULTLINE_CHAOS__ENABLED)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let app: Self = builder.build()?.try_deserialize()?;
        app.validate()?;
        info!(service = %app.service.name, chaos = app.chaos.enabled, "Configuration loaded");
        Ok(app)
    }

    /// Parse configuration from a TOML document layered over the defaults
    pub fn from_toml(source: &str) -> Result<Self, config::ConfigError> {
        let app: Self = Self::defaults()?
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    /// Reject telemetry settings the pipelines cannot run with
    fn validate(&self) -> Result<(), config::ConfigError> {
        self.telemetry
            .validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        let service = ServiceConfig::default();
        config::Config::builder()
            .set_default("service.name", service.name)?
            .set_default("service.version", service.version)?
            .set_default("chaos.enabled", false)
    }

    /// Validate the chaos section into a fault profile
    pub fn fault_profile(&self) -> Result<FaultProfile, ChaosConfigError> {
        let profile = self.chaos.fault_profile()?;
        debug!(base_delay = ?profile.base_delay(), "Fault profile validated");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::chaos::{LatencyClass, OutcomeClass};

    #[test]
    fn defaults_are_complete() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.service.name, "faultline");
        assert!(!config.chaos.enabled);
        assert_eq!(config.chaos.base_delay_ms, 50);
        assert_eq!(config.chaos.latency.len(), 3);
        assert_eq!(config.telemetry.metrics.interval_ms, 5000);
        assert!(config.fault_profile().is_ok());
    }

    #[test]
    fn toml_overrides() {
        let config = AppConfig::from_toml(
            r#"
            [service]
            name = "users-api"

            [chaos]
            enabled = true
            base_delay_ms = 10
            latency = [
                { class = "fast", probability = 0.5, delay_ms = 1 },
                { class = "slow", probability = 0.5, delay_ms = 5 },
            ]
            outcomes = [{ class = "fail", probability = 1.0 }]

            [telemetry]
            duration_buckets = [0.1, 1.0]

            [telemetry.logging]
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.service.name, "users-api");
        assert!(config.chaos.enabled);
        assert_eq!(config.telemetry.duration_buckets, vec![0.1, 1.0]);
        assert!(config.telemetry.logging.json);

        let profile = config.fault_profile().unwrap();
        assert_eq!(profile.base_delay(), Duration::from_millis(10));
        assert_eq!(profile.latency().entries()[1].0.class, LatencyClass::Slow);
        assert_eq!(profile.outcomes().entries()[0].0, OutcomeClass::Fail);
    }

    #[test]
    fn invalid_profile_fails_validation() {
        let config = AppConfig::from_toml(
            r#"
            [chaos]
            outcomes = [
                { class = "success", probability = 0.5 },
                { class = "fail", probability = 0.2 },
            ]
            "#,
        )
        .unwrap();

        assert!(matches!(
            config.fault_profile(),
            Err(ChaosConfigError::ProbabilitySum { .. })
        ));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let err = AppConfig::from_toml(
            r#"
            [telemetry.metrics]
            interval_ms = 0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("interval_ms"));

        let err = AppConfig::from_toml(
            r#"
            [telemetry.spans]
            scheduled_delay_ms = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, config::ConfigError::Message(_)));
    }

    #[test]
    fn unknown_class_is_rejected() {
        let result = AppConfig::from_toml(
            r#"
            [chaos]
            outcomes = [{ class = "maybe", probability = 1.0 }]
            "#,
        );
        assert!(result.is_err());
    }
}
