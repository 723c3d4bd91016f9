//! Infrastructure layer - Adapters, fault injection, and telemetry
//!
//! Implements the user source port with a stub generator, wraps it in the
//! chaos client, and provides the metrics and tracing pipelines that observe
//! request handling.

pub mod adapters;
pub mod chaos;
pub mod config;
pub mod telemetry;

pub use adapters::*;
pub use chaos::{ChaosClient, ChaosStats, ChaosSwitch, FaultProfile, FaultProfileConfig};
pub use config::{AppConfig, ChaosAppConfig, ServiceConfig};
pub use telemetry::{
    InboundRequest, RequestObserver, TelemetryConfig, TelemetryError, TelemetryPipeline,
    init_logging,
};
