//! Telemetry infrastructure
//!
//! Structured logging setup plus the metrics and tracing pipelines that
//! surround request handling. Both pipelines run on the OpenTelemetry SDK and
//! export through pluggable exporters on background threads.

mod error;
mod logging;
pub mod metrics;
mod pipeline;
mod request_observer;
mod resource;
pub mod testing;
pub mod trace;

pub use error::{ExportError, MetricsError, PropagationError, TelemetryError, TraceError};
pub use logging::{LoggingConfig, init_logging};
pub use pipeline::{TelemetryConfig, TelemetryPipeline};
pub use request_observer::{
    ATTR_HTTP_METHOD, ATTR_HTTP_STATUS, ATTR_SERVER_ADDRESS, ATTR_URL_PATH, ATTR_URL_SCHEME,
    InboundRequest, RequestObserver, ResponseStatus,
};
pub use opentelemetry::{KeyValue, Value};
pub use opentelemetry_sdk::Resource;
pub use resource::{SERVICE_NAME, SERVICE_VERSION, service_name, service_resource};
