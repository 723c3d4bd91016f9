//! Periodic metric collection on the SDK meter provider.

use std::time::Duration;

use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::view::ViewSelector;
use crate::telemetry::error::MetricsError;

/// Configuration for the periodic reader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodicReaderConfig {
    /// Collection interval in milliseconds (default: 5000)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

const fn default_interval_ms() -> u64 {
    5_000
}

impl Default for PeriodicReaderConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl PeriodicReaderConfig {
    /// Collection interval
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Reject settings the reader cannot run with
    pub fn validate(&self) -> Result<(), MetricsError> {
        if self.interval_ms == 0 {
            return Err(MetricsError::InvalidReaderConfig(
                "interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Build a meter provider exporting through `exporter` on a timer
///
/// The reader runs on its own thread. Views from `selector` are installed as
/// the provider's single view.
pub fn build_meter_provider<E>(
    resource: Resource,
    exporter: E,
    config: &PeriodicReaderConfig,
    selector: ViewSelector,
) -> Result<SdkMeterProvider, MetricsError>
where
    E: PushMetricExporter,
{
    config.validate()?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(config.interval())
        .build();
    let mut builder = SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader);
    if !selector.is_empty() {
        builder = builder.with_view(move |instrument: &opentelemetry_sdk::metrics::Instrument| {
            selector.select(instrument.name())
        });
    }

    info!(interval_ms = config.interval_ms, "Periodic metric reader started");
    Ok(builder.build())
}
