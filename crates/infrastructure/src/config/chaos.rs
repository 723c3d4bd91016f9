//! Chaos configuration: the enable flag and the fault profile.

use serde::{Deserialize, Serialize};

use crate::chaos::{
    ChaosConfigError, ChaosSwitch, FaultProfile, FaultProfileConfig, LatencyClassConfig,
    OutcomeClassConfig,
};

/// Fault injection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaosAppConfig {
    /// Initial state of the switch (default: false)
    ///
    /// The `CHAOS` environment variable overrides this when set.
    pub enabled: bool,

    /// Delay applied to every injected call in milliseconds
    pub base_delay_ms: u64,

    /// Latency classes with probability and delay
    pub latency: Vec<LatencyClassConfig>,

    /// Outcome classes with probability
    pub outcomes: Vec<OutcomeClassConfig>,
}

impl Default for ChaosAppConfig {
    fn default() -> Self {
        let profile = FaultProfileConfig::default();
        Self {
            enabled: false,
            base_delay_ms: profile.base_delay_ms,
            latency: profile.latency,
            outcomes: profile.outcomes,
        }
    }
}

impl ChaosAppConfig {
    /// The profile part of this section
    pub fn profile_config(&self) -> FaultProfileConfig {
        FaultProfileConfig {
            base_delay_ms: self.base_delay_ms,
            latency: self.latency.clone(),
            outcomes: self.outcomes.clone(),
        }
    }

    /// Validate into a [`FaultProfile`]
    pub fn fault_profile(&self) -> Result<FaultProfile, ChaosConfigError> {
        self.profile_config().build()
    }

    /// Build the switch, letting `CHAOS` win over the configured state
    pub fn switch(&self) -> ChaosSwitch {
        ChaosSwitch::from_env_or(self.enabled)
    }
}
