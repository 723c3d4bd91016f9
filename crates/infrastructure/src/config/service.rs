//! Service identity configuration.

use serde::{Deserialize, Serialize};

/// Identity attached to all emitted telemetry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name (default: faultline)
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Service version (default: the crate version)
    #[serde(default = "default_service_version")]
    pub version: String,
}

fn default_service_name() -> String {
    "faultline".to_string()
}

fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            version: default_service_version(),
        }
    }
}
