//! Wiring of the metrics and tracing pipelines for one service.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use opentelemetry::InstrumentationScope;
use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use opentelemetry_sdk::trace::{BatchSpanProcessor, SdkTracerProvider, SpanExporter};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::{ExportError, TelemetryError};
use super::logging::LoggingConfig;
use super::metrics::{
    CpuSampler, DURATION_BUCKETS, PeriodicReaderConfig, RequestInstruments, View, ViewSelector,
    build_meter_provider, register_instruments, request_instrument_specs, validate_boundaries,
};
use super::resource::service_name;
use super::trace::{BatchConfig, CountingSpanExporter, Tracer};

const DEFAULT_SCOPE: &str = "faultline";

/// Configuration for telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log subscriber settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Periodic metric collection
    #[serde(default)]
    pub metrics: PeriodicReaderConfig,

    /// Bucket bounds for the request duration histogram, in seconds
    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,

    /// Span batching
    #[serde(default)]
    pub spans: BatchConfig,

    /// Upper bound on flushing everything at shutdown, in milliseconds (default: 5000)
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_duration_buckets() -> Vec<f64> {
    DURATION_BUCKETS.to_vec()
}

const fn default_shutdown_timeout_ms() -> u64 {
    5_000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            metrics: PeriodicReaderConfig::default(),
            duration_buckets: default_duration_buckets(),
            spans: BatchConfig::default(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl TelemetryConfig {
    /// Shutdown timeout
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Reject settings neither pipeline can run with
    pub fn validate(&self) -> Result<(), TelemetryError> {
        self.metrics.validate()?;
        self.spans.validate()?;
        validate_boundaries(&self.duration_buckets)?;
        Ok(())
    }
}

/// Running metrics and tracing pipelines
///
/// Both export from SDK-owned background threads. Flush and shutdown block on
/// those threads, so they run on tokio's blocking pool.
pub struct TelemetryPipeline {
    resource: Resource,
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
    tracer: Tracer,
    meter: Meter,
    instruments: RequestInstruments,
    delivered: Arc<AtomicU64>,
    shutdown_timeout: Duration,
}

impl fmt::Debug for TelemetryPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryPipeline")
            .field("service", &service_name(&self.resource))
            .field("dropped_spans", &self.dropped_spans())
            .finish_non_exhaustive()
    }
}

impl TelemetryPipeline {
    /// Build both pipelines and register the request instruments
    ///
    /// The configuration is validated before anything starts. `views` apply to
    /// the request instruments and may override the duration buckets.
    pub fn install<S, M>(
        config: &TelemetryConfig,
        resource: Resource,
        span_exporter: S,
        metric_exporter: M,
        views: impl IntoIterator<Item = View>,
    ) -> Result<Self, TelemetryError>
    where
        S: SpanExporter + 'static,
        M: PushMetricExporter,
    {
        config.validate()?;
        let scope = service_name(&resource).unwrap_or_else(|| DEFAULT_SCOPE.to_string());

        let specs = request_instrument_specs(Arc::new(CpuSampler::new()), &config.duration_buckets);
        let selector = ViewSelector::new(views, &specs)?;
        let meter_provider =
            build_meter_provider(resource.clone(), metric_exporter, &config.metrics, selector)?;
        let meter = meter_provider.meter_with_scope(InstrumentationScope::builder(scope.clone()).build());
        let instruments = RequestInstruments::from_map(&register_instruments(&meter, specs)?)?;

        let span_exporter = CountingSpanExporter::new(span_exporter);
        let delivered = span_exporter.delivered();
        let processor = BatchSpanProcessor::builder(span_exporter)
            .with_batch_config(config.spans.to_sdk())
            .build();
        let tracer_provider = SdkTracerProvider::builder()
            .with_resource(resource.clone())
            .with_span_processor(processor)
            .build();
        let tracer = Tracer::new(tracer_provider.tracer(scope));

        info!(
            metric_interval_ms = config.metrics.interval_ms,
            span_delay_ms = config.spans.scheduled_delay_ms,
            "Telemetry pipeline installed"
        );

        Ok(Self {
            resource,
            tracer_provider,
            meter_provider,
            tracer,
            meter,
            instruments,
            delivered,
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    /// Service identity attached to everything exported
    pub const fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Tracer bound to the batch processor
    pub const fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Meter for additional instruments
    pub const fn meter(&self) -> &Meter {
        &self.meter
    }

    /// Request instruments
    pub const fn instruments(&self) -> &RequestInstruments {
        &self.instruments
    }

    /// Spans ended but never delivered to the exporter
    ///
    /// Spans still queued count as dropped until the next flush, so the
    /// figure is exact only right after [`force_flush`](Self::force_flush).
    pub fn dropped_spans(&self) -> u64 {
        self.tracer
            .finished_spans()
            .saturating_sub(self.delivered.load(Ordering::Acquire))
    }

    /// Export all buffered spans and metrics now
    pub async fn force_flush(&self) -> Result<(), TelemetryError> {
        let tracer_provider = self.tracer_provider.clone();
        let spans = self.blocking(move || tracer_provider.force_flush()).await;
        let meter_provider = self.meter_provider.clone();
        let metrics = self.blocking(move || meter_provider.force_flush()).await;
        spans?;
        metrics?;
        Ok(())
    }

    /// Flush and stop both pipelines
    ///
    /// Spans go first so that the metrics export reflects finished requests.
    pub async fn shutdown(self) -> Result<(), TelemetryError> {
        let tracer_provider = self.tracer_provider.clone();
        let spans = self.blocking(move || tracer_provider.shutdown()).await;
        let meter_provider = self.meter_provider.clone();
        let metrics = self.blocking(move || meter_provider.shutdown()).await;

        if let Err(e) = &spans {
            warn!(error = %e, "Span pipeline shutdown failed");
        }
        if let Err(e) = &metrics {
            warn!(error = %e, "Metric pipeline shutdown failed");
        }
        spans?;
        metrics?;
        info!(dropped_spans = self.dropped_spans(), "Telemetry pipeline shut down");
        Ok(())
    }

    async fn blocking<F>(&self, f: F) -> Result<(), ExportError>
    where
        F: FnOnce() -> OTelSdkResult + Send + 'static,
    {
        match tokio::time::timeout(self.shutdown_timeout, tokio::task::spawn_blocking(f)).await {
            Ok(Ok(result)) => result.map_err(ExportError::from),
            Ok(Err(join)) => Err(ExportError::Failed(join.to_string())),
            Err(_) => Err(ExportError::Timeout(self.shutdown_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::error::{MetricsError, TraceError};
    use crate::telemetry::metrics::{Aggregation, ERROR_RATE, REQUEST_DURATION};
    use crate::telemetry::resource::service_resource;
    use crate::telemetry::testing::{InMemoryMetricExporter, InMemorySpanExporter};
    use crate::telemetry::trace::SpanKind;

    fn install_with(
        config: &TelemetryConfig,
        views: Vec<View>,
    ) -> Result<(TelemetryPipeline, InMemorySpanExporter, InMemoryMetricExporter), TelemetryError> {
        let spans = InMemorySpanExporter::new();
        let metrics = InMemoryMetricExporter::new();
        let pipeline = TelemetryPipeline::install(
            config,
            service_resource("pipeline-test", "0.1.0"),
            spans.clone(),
            metrics.clone(),
            views,
        )?;
        Ok((pipeline, spans, metrics))
    }

    fn install(views: Vec<View>) -> (TelemetryPipeline, InMemorySpanExporter, InMemoryMetricExporter) {
        install_with(&TelemetryConfig::default(), views).unwrap()
    }

    #[test]
    fn config_defaults() {
        let config = TelemetryConfig::default();
        assert_eq!(config.duration_buckets, DURATION_BUCKETS);
        assert_eq!(config.metrics.interval_ms, 5000);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_interval_fails_install() {
        let mut config = TelemetryConfig::default();
        config.metrics.interval_ms = 0;
        assert!(matches!(
            install_with(&config, Vec::new()),
            Err(TelemetryError::Metrics(MetricsError::InvalidReaderConfig(_)))
        ));
    }

    #[test]
    fn zero_scheduled_delay_fails_install() {
        let mut config = TelemetryConfig::default();
        config.spans.scheduled_delay_ms = 0;
        assert!(matches!(
            install_with(&config, Vec::new()),
            Err(TelemetryError::Trace(TraceError::InvalidBatchConfig(_)))
        ));
    }

    #[test]
    fn invalid_buckets_fail_install() {
        let config = TelemetryConfig {
            duration_buckets: vec![1.0, 0.5],
            ..TelemetryConfig::default()
        };
        assert!(matches!(
            install_with(&config, Vec::new()),
            Err(TelemetryError::Metrics(MetricsError::InvalidBoundaries(_)))
        ));
    }

    #[test]
    fn invalid_view_fails_install() {
        let result = install_with(&TelemetryConfig::default(), vec![View::new("http.*").rename("x")]);
        assert!(matches!(
            result,
            Err(TelemetryError::Metrics(MetricsError::InvalidView { .. }))
        ));
    }

    #[tokio::test]
    async fn flush_delivers_spans_and_metrics() {
        let (pipeline, spans, metrics) = install(vec![]);

        pipeline.instruments().record_request("/", "GET", 200, 0.05);
        pipeline.tracer().start_root("op", SpanKind::Internal).end().unwrap();
        pipeline.force_flush().await.unwrap();

        assert_eq!(spans.finished_spans().len(), 1);
        assert_eq!(pipeline.dropped_spans(), 0);
        let latest = metrics.latest().unwrap();
        assert!(latest.metric(ERROR_RATE).is_some());
        assert!(latest.metric(REQUEST_DURATION).is_some());
        pipeline.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn caller_views_override_duration_buckets() {
        let (pipeline, _, metrics) = install(vec![
            View::new(REQUEST_DURATION).aggregation(Aggregation::explicit_buckets(vec![1.0]).unwrap()),
        ]);
        pipeline.instruments().record_request("/", "GET", 200, 0.5);
        pipeline.force_flush().await.unwrap();

        let collected = metrics.latest().unwrap();
        let point = &collected.metric(REQUEST_DURATION).unwrap().data.as_histogram().unwrap()[0];
        assert_eq!(point.bounds, vec![1.0]);
        assert_eq!(point.bucket_counts, vec![1, 0]);
        pipeline.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_exports_pending_spans() {
        let (pipeline, spans, metrics) = install(vec![]);
        pipeline.tracer().start_root("pending", SpanKind::Internal).end().unwrap();
        pipeline.shutdown().await.unwrap();

        assert_eq!(spans.finished_spans().len(), 1);
        assert!(spans.is_shutdown());
        assert!(metrics.is_shutdown());
    }
}
