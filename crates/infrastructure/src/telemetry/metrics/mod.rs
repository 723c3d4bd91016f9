//! Metrics pipeline: instruments, views, collection, and export.
//!
//! Instruments are registered on an SDK [`Meter`](opentelemetry::metrics::Meter).
//! Views decide each instrument's exported name, attribute keys, and
//! aggregation. A periodic reader collects the meter provider on a timer and
//! hands the result to a push exporter.

mod aggregation;
mod cpu;
mod exporter;
mod instrument;
mod reader;
mod request_instruments;
mod snapshot;
mod view;

pub use aggregation::{Aggregation, validate_boundaries};
pub use cpu::{CpuSampler, normalize_percent};
pub use exporter::LoggingMetricExporter;
pub use instrument::{
    GaugeCallback, Instrument, InstrumentDescriptor, InstrumentKind, InstrumentSpec, Observation,
    register_instruments, validate_instrument_name,
};
pub use opentelemetry_sdk::metrics::SdkMeterProvider;
pub use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
pub use reader::{PeriodicReaderConfig, build_meter_provider};
pub use request_instruments::{
    ATTR_METHOD, ATTR_ROUTE, ATTR_STATE, ATTR_STATUS_CODE, CPU_UTILIZATION, DURATION_BUCKETS,
    ERROR_RATE, REQUEST_DURATION, RequestInstruments, TRAFFIC_VOLUME, request_instrument_specs,
};
pub use snapshot::{
    HasAttributes, HistogramPoint, MetricPoints, MetricSnapshot, MetricsSnapshot, NumberPoint,
    find_point,
};
pub use view::{AttributeFilter, StreamConfig, View, ViewAction, ViewSelector, resolve_stream};
