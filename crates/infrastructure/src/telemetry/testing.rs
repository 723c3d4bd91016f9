//! In-memory sinks for asserting on emitted telemetry in tests.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{InstrumentationScope, Value};
use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::metrics::data::ResourceMetrics;
use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use opentelemetry_sdk::metrics::{SdkMeterProvider, Temporality};
use opentelemetry_sdk::trace::{SdkTracerProvider, SpanData, SpanExporter};
use parking_lot::Mutex;
use tracing::warn;

use super::metrics::{
    Instrument, InstrumentSpec, MetricsSnapshot, PeriodicReaderConfig, View, ViewSelector,
    build_meter_provider, register_instruments,
};
use super::resource::service_resource;
use super::trace::Tracer;

/// Span exporter collecting batches in memory; clones share storage
#[derive(Debug, Default, Clone)]
pub struct InMemorySpanExporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
    calls: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
}

impl InMemorySpanExporter {
    /// Create an empty exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// All exported spans in export order
    pub fn finished_spans(&self) -> Vec<SpanData> {
        self.spans.lock().clone()
    }

    /// Number of export calls
    pub fn export_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether shutdown was called
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

impl SpanExporter for InMemorySpanExporter {
    async fn export(&self, batch: Vec<SpanData>) -> OTelSdkResult {
        if self.is_shutdown() {
            return Err(OTelSdkError::AlreadyShutdown);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.spans.lock().extend(batch);
        Ok(())
    }

    fn shutdown_with_timeout(&mut self, _timeout: Duration) -> OTelSdkResult {
        self.shutdown.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Metric exporter keeping every collection in memory; clones share storage
#[derive(Debug, Default, Clone)]
pub struct InMemoryMetricExporter {
    collections: Arc<Mutex<Vec<MetricsSnapshot>>>,
    shutdown: Arc<AtomicBool>,
}

impl InMemoryMetricExporter {
    /// Create an empty exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// All exported collections
    pub fn collections(&self) -> Vec<MetricsSnapshot> {
        self.collections.lock().clone()
    }

    /// The most recent collection
    pub fn latest(&self) -> Option<MetricsSnapshot> {
        self.collections.lock().last().cloned()
    }

    /// Whether shutdown was called
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

impl PushMetricExporter for InMemoryMetricExporter {
    async fn export(&self, metrics: &ResourceMetrics) -> OTelSdkResult {
        self.collections
            .lock()
            .push(MetricsSnapshot::from_resource_metrics(metrics));
        Ok(())
    }

    fn force_flush(&self) -> OTelSdkResult {
        Ok(())
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> OTelSdkResult {
        self.shutdown.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn temporality(&self) -> Temporality {
        Temporality::Cumulative
    }
}

/// Value of a span attribute
pub fn span_attribute(span: &SpanData, key: &str) -> Option<Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.clone())
}

/// Synchronous tracer and meter wired to in-memory exporters
///
/// Spans are exported as soon as they end. Metrics are only collected by
/// [`collect`](Self::collect).
pub struct TestTelemetry {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
    tracer: Tracer,
    meter: Meter,
    instruments: HashMap<String, Instrument>,
    spans: InMemorySpanExporter,
    metrics: InMemoryMetricExporter,
}

impl fmt::Debug for TestTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestTelemetry")
            .field("tracer", &self.tracer)
            .field("instruments", &self.instruments.len())
            .finish_non_exhaustive()
    }
}

impl TestTelemetry {
    /// Telemetry without views or pre-registered instruments
    pub fn new(scope: &str) -> Self {
        Self::builder(scope).build()
    }

    /// Start configuring test telemetry
    pub fn builder(scope: &str) -> TestTelemetryBuilder {
        TestTelemetryBuilder {
            scope: scope.to_string(),
            views: Vec::new(),
            instruments: Vec::new(),
        }
    }

    /// Tracer exporting to memory
    pub const fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Meter on the test provider
    pub const fn meter(&self) -> &Meter {
        &self.meter
    }

    /// Instrument registered by the builder
    pub fn instrument(&self, name: &str) -> Option<&Instrument> {
        self.instruments.get(name)
    }

    /// Spans ended so far, in end order
    pub fn finished_spans(&self) -> Vec<SpanData> {
        self.spans.finished_spans()
    }

    /// The span exporter
    pub const fn span_exporter(&self) -> &InMemorySpanExporter {
        &self.spans
    }

    /// Collect and export metrics now
    ///
    /// Empty when the collection produced nothing.
    pub fn collect(&self) -> MetricsSnapshot {
        let before = self.metrics.collections().len();
        if let Err(e) = self.meter_provider.force_flush() {
            warn!(error = %e, "Test metric collection failed");
        }
        let collections = self.metrics.collections();
        if collections.len() > before {
            collections.last().cloned().unwrap_or_default()
        } else {
            MetricsSnapshot::default()
        }
    }

    /// Shut both providers down
    pub fn shutdown(&self) {
        if let Err(e) = self.tracer_provider.shutdown() {
            warn!(error = %e, "Test tracer provider shutdown failed");
        }
        if let Err(e) = self.meter_provider.shutdown() {
            warn!(error = %e, "Test meter provider shutdown failed");
        }
    }
}

/// Builder for [`TestTelemetry`]
#[derive(Debug)]
pub struct TestTelemetryBuilder {
    scope: String,
    views: Vec<View>,
    instruments: Vec<InstrumentSpec>,
}

impl TestTelemetryBuilder {
    /// Views applied to the meter provider
    #[must_use]
    pub fn with_views(mut self, views: impl IntoIterator<Item = View>) -> Self {
        self.views.extend(views);
        self
    }

    /// Instruments registered at build time and visible to the views
    #[must_use]
    pub fn with_instruments(mut self, specs: impl IntoIterator<Item = InstrumentSpec>) -> Self {
        self.instruments.extend(specs);
        self
    }

    /// Build the providers
    ///
    /// Invalid views or instruments are logged and left out.
    pub fn build(self) -> TestTelemetry {
        let resource = service_resource(&self.scope, "0.0.0");
        let spans = InMemorySpanExporter::new();
        let metrics = InMemoryMetricExporter::new();

        let selector = ViewSelector::new(self.views, &self.instruments).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring invalid test views");
            ViewSelector::default()
        });
        let meter_provider = build_meter_provider(
            resource.clone(),
            metrics.clone(),
            &PeriodicReaderConfig { interval_ms: 3_600_000 },
            selector,
        )
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to a plain test meter provider");
            SdkMeterProvider::builder().build()
        });
        let meter = meter_provider.meter_with_scope(InstrumentationScope::builder(self.scope.clone()).build());
        let instruments = register_instruments(&meter, self.instruments).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring invalid test instruments");
            HashMap::new()
        });

        let tracer_provider = SdkTracerProvider::builder()
            .with_resource(resource)
            .with_simple_exporter(spans.clone())
            .build();
        let tracer = Tracer::new(tracer_provider.tracer(self.scope));

        TestTelemetry {
            tracer_provider,
            meter_provider,
            tracer,
            meter,
            instruments,
            spans,
            metrics,
        }
    }
}
