//! Telemetry error types

use std::time::Duration;

use opentelemetry_sdk::error::OTelSdkError;
use thiserror::Error;

/// Error type for telemetry initialization and shutdown
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize tracing subscriber
    #[error("Failed to initialize tracing: {0}")]
    Init(String),

    /// Invalid metrics configuration
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// Invalid trace configuration or span misuse
    #[error(transparent)]
    Trace(#[from] TraceError),

    /// Exporter failed during flush or shutdown
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Errors raised while registering instruments or views
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    /// Instrument name is not a valid identifier
    #[error("Invalid instrument name '{0}'")]
    InvalidInstrumentName(String),

    /// Same name registered twice with different kinds
    #[error("Instrument '{name}' already registered as {existing}, cannot register as {requested}")]
    ConflictingInstrument {
        name: String,
        existing: &'static str,
        requested: &'static str,
    },

    /// Histogram boundaries are not finite and strictly increasing
    #[error("Invalid bucket boundaries: {0}")]
    InvalidBoundaries(String),

    /// View definition cannot be applied
    #[error("Invalid view '{pattern}': {reason}")]
    InvalidView { pattern: String, reason: String },

    /// Expected instrument absent from a registration result
    #[error("Instrument '{0}' is not registered with the expected kind")]
    MissingInstrument(String),

    /// Periodic reader settings cannot drive a collection loop
    #[error("Invalid metric reader config: {0}")]
    InvalidReaderConfig(String),
}

/// Errors raised by the span lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    /// `end` called on a span that already ended
    #[error("Span '{0}' already ended")]
    AlreadyEnded(String),

    /// `end` called while child spans are still open
    #[error("Span '{name}' still has {open} open child span(s)")]
    OpenChildren { name: String, open: usize },

    /// Batch settings cannot drive an export loop
    #[error("Invalid span batch config: {0}")]
    InvalidBatchConfig(String),
}

/// Errors raised while extracting a remote context from a carrier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropagationError {
    /// No `traceparent` header in the carrier
    #[error("Missing traceparent header")]
    Missing,

    /// Header present but not a valid W3C traceparent
    #[error("Malformed traceparent '{0}'")]
    Malformed(String),
}

/// Errors raised by exporters and background pipelines
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    /// Exporter rejected or failed to deliver a batch
    #[error("Export failed: {0}")]
    Failed(String),

    /// Flush or shutdown did not finish in time
    #[error("Export timed out after {0:?}")]
    Timeout(Duration),

    /// Exporter was already shut down
    #[error("Exporter is shut down")]
    Shutdown,
}

impl From<OTelSdkError> for ExportError {
    fn from(err: OTelSdkError) -> Self {
        match err {
            OTelSdkError::AlreadyShutdown => Self::Shutdown,
            OTelSdkError::Timeout(timeout) => Self::Timeout(timeout),
            OTelSdkError::InternalFailure(reason) => Self::Failed(reason),
            #[allow(unreachable_patterns)]
            other => Self::Failed(other.to_string()),
        }
    }
}
