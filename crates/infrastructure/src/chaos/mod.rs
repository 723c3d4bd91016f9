//! Chaos engineering: latency and failure injection around the user source.
//!
//! # Overview
//!
//! - `FaultProfile`: validated latency and outcome distributions
//! - `ChaosSwitch`: shared flag, re-read on every call
//! - `ChaosClient`: decorates a `UserSourcePort` and applies the profile
//! - `ChaosContext`: lock-free injection statistics
//!
//! # Example
//!
//! ```ignore
//! use infrastructure::chaos::{ChaosClient, ChaosSwitch, FaultProfile};
//!
//! let switch = ChaosSwitch::from_env_or(false);
//! let client = ChaosClient::new(upstream, FaultProfile::default(), switch.clone());
//!
//! let (outcome, status) = client.lookup_user(123).await?;
//! ```

mod chaos_client;
mod chaos_context;
mod chaos_switch;
mod fault_profile;

pub use chaos_client::ChaosClient;
pub use chaos_context::{ChaosContext, ChaosStats, InjectionResult};
pub use chaos_switch::{CHAOS_ENV_VAR, ChaosSwitch, env_flag, parse_flag};
pub use fault_profile::{
    ChaosConfigError, DiscreteDistribution, FaultProfile, FaultProfileConfig, LatencyClass,
    LatencyClassConfig, LatencySample, LatencyTier, OutcomeClass, OutcomeClassConfig,
    PROBABILITY_TOLERANCE,
};
