//! Tracing pipeline: spans with strict nesting, the task-local active span,
//! and W3C propagation, on top of the OpenTelemetry SDK.

mod batch;
mod exporter;
mod propagation;
mod span;
mod tracer;

pub use batch::BatchConfig;
pub use exporter::{CountingSpanExporter, LoggingSpanExporter};
pub use propagation::{Carrier, HeaderPropagator, TRACEPARENT_HEADER, TRACESTATE_HEADER};
pub use span::{ATTR_ERROR, ATTR_ERROR_TYPE, Span};
pub use tracer::{Tracer, current_span, with_active_span};

/// Trace types, re-exported so callers need no direct dependency
pub use opentelemetry::trace::{SpanContext, SpanId, SpanKind, Status, TraceFlags, TraceId, TraceState};
pub use opentelemetry_sdk::trace::{SpanData, SpanExporter};
