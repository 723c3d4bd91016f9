//! Owned copy of one SDK metrics collection.
//!
//! The SDK hands exporters a borrowed [`ResourceMetrics`]. Exporters that log
//! or keep collections convert it into a [`MetricsSnapshot`], which flattens
//! every number type to `f64`.

use opentelemetry::{KeyValue, Value};
use opentelemetry_sdk::metrics::data::{
    AggregatedMetrics, Gauge, Histogram, MetricData, ResourceMetrics, Sum,
};

/// Numeric data point of a sum or gauge
#[derive(Debug, Clone, PartialEq)]
pub struct NumberPoint {
    /// Attribute set of the series
    pub attributes: Vec<KeyValue>,
    /// Current value
    pub value: f64,
}

/// Data point of an explicit-bucket histogram
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramPoint {
    /// Attribute set of the series
    pub attributes: Vec<KeyValue>,
    /// Number of recorded values
    pub count: u64,
    /// Sum of recorded values
    pub sum: f64,
    /// Upper bucket bounds
    pub bounds: Vec<f64>,
    /// Per-bucket counts; one more than `bounds`
    pub bucket_counts: Vec<u64>,
}

/// Attribute lookup on a data point
pub trait HasAttributes {
    /// The series attributes
    fn attributes(&self) -> &[KeyValue];

    /// Value of one attribute
    fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes()
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }
}

impl HasAttributes for NumberPoint {
    fn attributes(&self) -> &[KeyValue] {
        &self.attributes
    }
}

impl HasAttributes for HistogramPoint {
    fn attributes(&self) -> &[KeyValue] {
        &self.attributes
    }
}

/// First point carrying all of the given attribute values
pub fn find_point<'a, P: HasAttributes>(points: &'a [P], wanted: &[(&str, Value)]) -> Option<&'a P> {
    points
        .iter()
        .find(|p| wanted.iter().all(|(k, v)| p.attribute(k) == Some(v)))
}

/// Points of one metric stream
#[derive(Debug, Clone, PartialEq)]
pub enum MetricPoints {
    /// Monotonic or non-monotonic sum
    Sum(Vec<NumberPoint>),
    /// Last observed value
    Gauge(Vec<NumberPoint>),
    /// Bucketed distribution
    Histogram(Vec<HistogramPoint>),
}

impl MetricPoints {
    /// Sum points, if this is a sum
    pub fn as_sum(&self) -> Option<&[NumberPoint]> {
        match self {
            Self::Sum(points) => Some(points),
            _ => None,
        }
    }

    /// Gauge points, if this is a gauge
    pub fn as_gauge(&self) -> Option<&[NumberPoint]> {
        match self {
            Self::Gauge(points) => Some(points),
            _ => None,
        }
    }

    /// Histogram points, if this is a histogram
    pub fn as_histogram(&self) -> Option<&[HistogramPoint]> {
        match self {
            Self::Histogram(points) => Some(points),
            _ => None,
        }
    }

    /// Number of series
    pub fn len(&self) -> usize {
        match self {
            Self::Sum(points) | Self::Gauge(points) => points.len(),
            Self::Histogram(points) => points.len(),
        }
    }

    /// Whether the stream has no series
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One exported metric stream
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    /// Instrumentation scope that produced it
    pub scope: String,
    /// Exported name, after views
    pub name: String,
    /// Unit of measure
    pub unit: String,
    /// Human-readable description
    pub description: String,
    /// The series
    pub data: MetricPoints,
}

/// Every stream of one collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// Streams in collection order
    pub metrics: Vec<MetricSnapshot>,
}

impl MetricsSnapshot {
    /// Copy an SDK collection
    ///
    /// Exponential histograms are skipped; no instrument here produces one.
    pub fn from_resource_metrics(resource_metrics: &ResourceMetrics) -> Self {
        let mut metrics = Vec::new();
        for scope_metrics in resource_metrics.scope_metrics() {
            let scope = scope_metrics.scope().name().to_string();
            for metric in scope_metrics.metrics() {
                let data = match metric.data() {
                    AggregatedMetrics::F64(data) => convert(data),
                    AggregatedMetrics::U64(data) => convert(data),
                    AggregatedMetrics::I64(data) => convert(data),
                    #[allow(unreachable_patterns)]
                    _ => None,
                };
                if let Some(data) = data {
                    metrics.push(MetricSnapshot {
                        scope: scope.clone(),
                        name: metric.name().to_string(),
                        unit: metric.unit().to_string(),
                        description: metric.description().to_string(),
                        data,
                    });
                }
            }
        }
        Self { metrics }
    }

    /// Stream by exported name
    pub fn metric(&self, name: &str) -> Option<&MetricSnapshot> {
        self.metrics.iter().find(|m| m.name == name)
    }

    /// Number of streams
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Whether nothing was collected
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

trait AsF64: Copy {
    fn as_f64(self) -> f64;
}

impl AsF64 for f64 {
    fn as_f64(self) -> f64 {
        self
    }
}

impl AsF64 for u64 {
    #[allow(clippy::cast_precision_loss)]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl AsF64 for i64 {
    #[allow(clippy::cast_precision_loss)]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

fn convert<T: AsF64>(data: &MetricData<T>) -> Option<MetricPoints> {
    match data {
        MetricData::Sum(sum) => Some(MetricPoints::Sum(sum_points(sum))),
        MetricData::Gauge(gauge) => Some(MetricPoints::Gauge(gauge_points(gauge))),
        MetricData::Histogram(histogram) => Some(MetricPoints::Histogram(histogram_points(histogram))),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn sum_points<T: AsF64>(sum: &Sum<T>) -> Vec<NumberPoint> {
    sum.data_points()
        .map(|p| NumberPoint {
            attributes: p.attributes().cloned().collect(),
            value: p.value().as_f64(),
        })
        .collect()
}

fn gauge_points<T: AsF64>(gauge: &Gauge<T>) -> Vec<NumberPoint> {
    gauge
        .data_points()
        .map(|p| NumberPoint {
            attributes: p.attributes().cloned().collect(),
            value: p.value().as_f64(),
        })
        .collect()
}

fn histogram_points<T: AsF64>(histogram: &Histogram<T>) -> Vec<HistogramPoint> {
    histogram
        .data_points()
        .map(|p| HistogramPoint {
            attributes: p.attributes().cloned().collect(),
            count: p.count(),
            sum: p.sum().as_f64(),
            bounds: p.bounds().collect(),
            bucket_counts: p.bucket_counts().collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(route: &str, value: f64) -> NumberPoint {
        NumberPoint {
            attributes: vec![KeyValue::new("http.route", route.to_string()), KeyValue::new("state", "fail")],
            value,
        }
    }

    #[test]
    fn find_point_matches_all_pairs() {
        let points = [point("/", 1.0), point("/users/{id}", 3.0)];
        let found = find_point(&points, &[("http.route", Value::from("/users/{id}"))]).unwrap();
        assert!((found.value - 3.0).abs() < f64::EPSILON);

        assert!(
            find_point(
                &points,
                &[("http.route", Value::from("/")), ("state", Value::from("success"))]
            )
            .is_none()
        );
        assert_eq!(points[0].attribute("state"), Some(&Value::from("fail")));
        assert!(points[0].attribute("missing").is_none());
    }

    #[test]
    fn empty_collection() {
        let snapshot = MetricsSnapshot::default();
        assert!(snapshot.is_empty());
        assert!(snapshot.metric("anything").is_none());
        assert!(MetricPoints::Sum(Vec::new()).is_empty());
    }
}
