//! The fixed set of HTTP request instruments and how requests are recorded.

use std::collections::HashMap;
use std::sync::Arc;

use domain::RequestState;
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter, ObservableGauge};

use super::cpu::CpuSampler;
use super::instrument::{Instrument, InstrumentSpec, Observation, register_instruments};
use crate::telemetry::error::MetricsError;

/// Requests hitting the root route
pub const TRAFFIC_VOLUME: &str = "traffic_volume";
/// Completed requests by outcome
pub const ERROR_RATE: &str = "error_rate";
/// Request duration histogram
pub const REQUEST_DURATION: &str = "http.server.request.duration";
/// CPU utilization gauge; samples the whole host despite the name
pub const CPU_UTILIZATION: &str = "process.cpu.utilization";

/// Attribute key: route template, e.g. `/users/{id}`
pub const ATTR_ROUTE: &str = "http.route";
/// Attribute key: request outcome (`success` or `fail`)
pub const ATTR_STATE: &str = "state";
/// Attribute key: HTTP method
pub const ATTR_METHOD: &str = "http.request.method";
/// Attribute key: response status code
pub const ATTR_STATUS_CODE: &str = "http.response.status_code";

/// Bucket boundaries for request durations, in seconds
pub const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

/// Specs for the request instruments
///
/// The histogram uses `duration_buckets` unless a view overrides its
/// aggregation.
pub fn request_instrument_specs(cpu: Arc<CpuSampler>, duration_buckets: &[f64]) -> Vec<InstrumentSpec> {
    vec![
        InstrumentSpec::counter(TRAFFIC_VOLUME, "request", "Number of requests to the root route")
            .with_attribute_keys(&[ATTR_ROUTE]),
        InstrumentSpec::counter(ERROR_RATE, "request", "Completed requests by outcome")
            .with_attribute_keys(&[ATTR_ROUTE, ATTR_STATE]),
        InstrumentSpec::histogram(REQUEST_DURATION, "s", "Duration of HTTP server requests")
            .with_attribute_keys(&[ATTR_METHOD, ATTR_ROUTE, ATTR_STATUS_CODE])
            .with_boundaries(duration_buckets.to_vec()),
        InstrumentSpec::gauge(CPU_UTILIZATION, "1", "System-wide CPU utilization", move || {
            vec![Observation::new(cpu.sample())]
        }),
    ]
}

/// Handles to the request instruments
#[derive(Debug, Clone)]
pub struct RequestInstruments {
    traffic_volume: Counter<u64>,
    error_rate: Counter<u64>,
    duration: Histogram<f64>,
    // Held so the gauge callback stays registered.
    _cpu_utilization: ObservableGauge<f64>,
}

impl RequestInstruments {
    /// Register the instruments on a meter
    pub fn register(meter: &Meter, cpu: Arc<CpuSampler>, duration_buckets: &[f64]) -> Result<Self, MetricsError> {
        let instruments = register_instruments(meter, request_instrument_specs(cpu, duration_buckets))?;
        Self::from_map(&instruments)
    }

    /// Pick the handles out of a registration result
    pub fn from_map(instruments: &HashMap<String, Instrument>) -> Result<Self, MetricsError> {
        let missing = |name: &str| MetricsError::MissingInstrument(name.to_string());
        let counter = |name: &str| {
            instruments
                .get(name)
                .and_then(Instrument::as_counter)
                .cloned()
                .ok_or_else(|| missing(name))
        };

        Ok(Self {
            traffic_volume: counter(TRAFFIC_VOLUME)?,
            error_rate: counter(ERROR_RATE)?,
            duration: instruments
                .get(REQUEST_DURATION)
                .and_then(Instrument::as_histogram)
                .cloned()
                .ok_or_else(|| missing(REQUEST_DURATION))?,
            _cpu_utilization: instruments
                .get(CPU_UTILIZATION)
                .and_then(Instrument::as_gauge)
                .cloned()
                .ok_or_else(|| missing(CPU_UTILIZATION))?,
        })
    }

    /// Count a request to the root route
    pub fn record_traffic(&self, route: &str) {
        self.traffic_volume
            .add(1, &[KeyValue::new(ATTR_ROUTE, route.to_string())]);
    }

    /// Record a completed request under its route template
    pub fn record_request(&self, route: &str, method: &str, status: u16, duration_secs: f64) {
        let state = RequestState::from_status(status);
        self.error_rate.add(
            1,
            &[
                KeyValue::new(ATTR_ROUTE, route.to_string()),
                KeyValue::new(ATTR_STATE, state.as_str()),
            ],
        );
        self.duration.record(
            duration_secs,
            &[
                KeyValue::new(ATTR_METHOD, method.to_string()),
                KeyValue::new(ATTR_ROUTE, route.to_string()),
                KeyValue::new(ATTR_STATUS_CODE, i64::from(status)),
            ],
        );
    }
}
