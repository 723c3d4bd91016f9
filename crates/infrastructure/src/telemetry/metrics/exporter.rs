//! Metric exporters

use std::time::Duration;

use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::metrics::Temporality;
use opentelemetry_sdk::metrics::data::ResourceMetrics;
use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use tracing::info;

use super::snapshot::{MetricPoints, MetricsSnapshot};

/// Writes every collected data point to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMetricExporter;

impl LoggingMetricExporter {
    fn log(snapshot: &MetricsSnapshot) {
        for metric in &snapshot.metrics {
            match &metric.data {
                MetricPoints::Sum(points) => {
                    for p in points {
                        info!(
                            metric = %metric.name,
                            unit = %metric.unit,
                            attributes = ?p.attributes,
                            value = p.value,
                            "sum"
                        );
                    }
                },
                MetricPoints::Gauge(points) => {
                    for p in points {
                        info!(
                            metric = %metric.name,
                            unit = %metric.unit,
                            attributes = ?p.attributes,
                            value = p.value,
                            "gauge"
                        );
                    }
                },
                MetricPoints::Histogram(points) => {
                    for p in points {
                        info!(
                            metric = %metric.name,
                            unit = %metric.unit,
                            attributes = ?p.attributes,
                            count = p.count,
                            sum = p.sum,
                            buckets = ?p.bucket_counts,
                            "histogram"
                        );
                    }
                },
            }
        }
    }
}

impl PushMetricExporter for LoggingMetricExporter {
    async fn export(&self, metrics: &ResourceMetrics) -> OTelSdkResult {
        Self::log(&MetricsSnapshot::from_resource_metrics(metrics));
        Ok(())
    }

    fn force_flush(&self) -> OTelSdkResult {
        Ok(())
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> OTelSdkResult {
        Ok(())
    }

    fn temporality(&self) -> Temporality {
        Temporality::Cumulative
    }
}
