//! Settings for the SDK batch span processor.

use std::time::Duration;

use opentelemetry_sdk::trace::{BatchConfig as SdkBatchConfig, BatchConfigBuilder};
use serde::{Deserialize, Serialize};

use crate::telemetry::error::TraceError;

/// Span batching settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Spans buffered before new ones are dropped (default: 2048)
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Delay between scheduled exports in milliseconds (default: 5000)
    #[serde(default = "default_scheduled_delay_ms")]
    pub scheduled_delay_ms: u64,

    /// Maximum spans per export call (default: 512)
    #[serde(default = "default_max_export_batch_size")]
    pub max_export_batch_size: usize,
}

const fn default_max_queue_size() -> usize {
    2048
}

const fn default_scheduled_delay_ms() -> u64 {
    5_000
}

const fn default_max_export_batch_size() -> usize {
    512
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            scheduled_delay_ms: default_scheduled_delay_ms(),
            max_export_batch_size: default_max_export_batch_size(),
        }
    }
}

impl BatchConfig {
    /// Delay between scheduled exports
    pub const fn scheduled_delay(&self) -> Duration {
        Duration::from_millis(self.scheduled_delay_ms)
    }

    /// Reject settings the export loop cannot run with
    pub fn validate(&self) -> Result<(), TraceError> {
        if self.scheduled_delay_ms == 0 {
            return Err(TraceError::InvalidBatchConfig(
                "scheduled_delay_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_queue_size == 0 {
            return Err(TraceError::InvalidBatchConfig(
                "max_queue_size must be greater than zero".to_string(),
            ));
        }
        if self.max_export_batch_size == 0 || self.max_export_batch_size > self.max_queue_size {
            return Err(TraceError::InvalidBatchConfig(format!(
                "max_export_batch_size must be between 1 and max_queue_size ({})",
                self.max_queue_size
            )));
        }
        Ok(())
    }

    /// The equivalent SDK batch config
    pub fn to_sdk(&self) -> SdkBatchConfig {
        BatchConfigBuilder::default()
            .with_max_queue_size(self.max_queue_size)
            .with_scheduled_delay(self.scheduled_delay())
            .with_max_export_batch_size(self.max_export_batch_size)
            .build()
    }
}
