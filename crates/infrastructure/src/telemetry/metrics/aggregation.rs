//! Aggregation overrides a view can apply.

use opentelemetry_sdk::metrics::Aggregation as SdkAggregation;
use serde::{Deserialize, Serialize};

use crate::telemetry::error::MetricsError;

/// How measurements of a stream are combined before export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Aggregation {
    /// Pick by instrument kind: sum for counters, histogram for histograms,
    /// last value for gauges
    Default,
    /// Discard all measurements
    Drop,
    /// Running total
    Sum,
    /// Most recent measurement
    LastValue,
    /// Bucketed distribution
    ExplicitBucketHistogram {
        /// Upper bucket bounds, strictly increasing
        boundaries: Vec<f64>,
        /// Track min and max of recorded values
        #[serde(default = "default_record_min_max")]
        record_min_max: bool,
    },
}

const fn default_record_min_max() -> bool {
    true
}

impl Aggregation {
    /// Histogram aggregation with the given boundaries, validated
    pub fn explicit_buckets(boundaries: Vec<f64>) -> Result<Self, MetricsError> {
        validate_boundaries(&boundaries)?;
        Ok(Self::ExplicitBucketHistogram {
            boundaries,
            record_min_max: true,
        })
    }

    /// Check that the aggregation is usable
    pub fn validate(&self) -> Result<(), MetricsError> {
        match self {
            Self::ExplicitBucketHistogram { boundaries, .. } => validate_boundaries(boundaries),
            Self::Default | Self::Drop | Self::Sum | Self::LastValue => Ok(()),
        }
    }

    /// The SDK aggregation; `None` leaves the instrument's default in place
    pub fn to_sdk(&self) -> Option<SdkAggregation> {
        match self {
            Self::Default => None,
            Self::Drop => Some(SdkAggregation::Drop),
            Self::Sum => Some(SdkAggregation::Sum),
            Self::LastValue => Some(SdkAggregation::LastValue),
            Self::ExplicitBucketHistogram {
                boundaries,
                record_min_max,
            } => Some(SdkAggregation::ExplicitBucketHistogram {
                boundaries: boundaries.clone(),
                record_min_max: *record_min_max,
            }),
        }
    }
}

/// Validate histogram boundaries: finite and strictly increasing
pub fn validate_boundaries(boundaries: &[f64]) -> Result<(), MetricsError> {
    if let Some(b) = boundaries.iter().find(|b| !b.is_finite()) {
        return Err(MetricsError::InvalidBoundaries(format!(
            "boundary {b} is not finite"
        )));
    }
    if let Some(pair) = boundaries.windows(2).find(|w| w[0] >= w[1]) {
        return Err(MetricsError::InvalidBoundaries(format!(
            "{} is not less than {}",
            pair[0], pair[1]
        )));
    }
    Ok(())
}
