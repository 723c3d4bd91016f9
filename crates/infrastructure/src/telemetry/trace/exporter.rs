//! Span exporters

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use opentelemetry_sdk::Resource;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::trace::{SpanData, SpanExporter};
use tracing::info;

/// Writes every finished span to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSpanExporter;

impl SpanExporter for LoggingSpanExporter {
    async fn export(&self, batch: Vec<SpanData>) -> OTelSdkResult {
        for span in batch {
            let duration_ms = span
                .end_time
                .duration_since(span.start_time)
                .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
            info!(
                span = %span.name,
                trace_id = %span.span_context.trace_id(),
                span_id = %span.span_context.span_id(),
                parent_span_id = %span.parent_span_id,
                kind = ?span.span_kind,
                status = ?span.status,
                duration_ms,
                attributes = ?span.attributes,
                "span"
            );
        }
        Ok(())
    }
}

/// Forwards to another exporter and counts the spans it accepted
///
/// Spans the batch processor drops never reach an exporter, so the count is
/// what the pipeline compares against spans ended to report drops.
#[derive(Debug)]
pub struct CountingSpanExporter<E> {
    inner: E,
    delivered: Arc<AtomicU64>,
}

impl<E: SpanExporter> CountingSpanExporter<E> {
    /// Wrap an exporter
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            delivered: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared counter of delivered spans
    pub fn delivered(&self) -> Arc<AtomicU64> {
        self.delivered.clone()
    }
}

impl<E: SpanExporter> SpanExporter for CountingSpanExporter<E> {
    async fn export(&self, batch: Vec<SpanData>) -> OTelSdkResult {
        let count = batch.len() as u64;
        let result = self.inner.export(batch).await;
        if result.is_ok() {
            self.delivered.fetch_add(count, Ordering::AcqRel);
        }
        result
    }

    fn shutdown_with_timeout(&mut self, timeout: Duration) -> OTelSdkResult {
        self.inner.shutdown_with_timeout(timeout)
    }

    fn force_flush(&mut self) -> OTelSdkResult {
        self.inner.force_flush()
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.inner.set_resource(resource);
    }
}
