//! Instrument definitions and their registration on an SDK meter.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter, ObservableGauge};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::aggregation::validate_boundaries;
use crate::telemetry::error::MetricsError;

const MAX_INSTRUMENT_NAME_LEN: usize = 255;

/// Check an instrument name: ASCII letter first, then letters, digits, `_ . - /`
pub fn validate_instrument_name(name: &str) -> Result<(), MetricsError> {
    let mut chars = name.chars();
    let valid = name.len() <= MAX_INSTRUMENT_NAME_LEN
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '/'));

    if valid {
        Ok(())
    } else {
        Err(MetricsError::InvalidInstrumentName(name.to_string()))
    }
}

/// Instrument type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    /// Monotonic counter
    Counter,
    /// Distribution of recorded values
    Histogram,
    /// Pull-based value read at collection time
    ObservableGauge,
}

impl InstrumentKind {
    /// Lowercase name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Histogram => "histogram",
            Self::ObservableGauge => "observable_gauge",
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity and metadata of an instrument
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstrumentDescriptor {
    /// Instrument name; the identity
    pub name: String,
    /// Instrument type
    pub kind: InstrumentKind,
    /// Unit of measurement
    pub unit: String,
    /// Human-readable description
    pub description: String,
}

/// A value reported by a gauge callback
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Observed value
    pub value: f64,
    /// Attributes for the observation
    pub attributes: Vec<KeyValue>,
}

impl Observation {
    /// Observation without attributes
    pub const fn new(value: f64) -> Self {
        Self {
            value,
            attributes: Vec::new(),
        }
    }

    /// Observation with attributes
    pub const fn with_attributes(value: f64, attributes: Vec<KeyValue>) -> Self {
        Self { value, attributes }
    }
}

/// Callback polled by an observable gauge on every collection
pub type GaugeCallback = Arc<dyn Fn() -> Vec<Observation> + Send + Sync>;

/// Definition of an instrument to register
#[derive(Clone)]
pub struct InstrumentSpec {
    /// Name, kind and metadata
    pub descriptor: InstrumentDescriptor,
    /// Attribute keys recordings carry; views that drop keys keep the rest
    pub attribute_keys: Vec<String>,
    /// Bucket bounds for a histogram; the SDK default when `None`
    pub boundaries: Option<Vec<f64>>,
    /// Gauge callback; required for observable gauges, ignored otherwise
    pub callback: Option<GaugeCallback>,
}

impl fmt::Debug for InstrumentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentSpec")
            .field("descriptor", &self.descriptor)
            .field("attribute_keys", &self.attribute_keys)
            .field("boundaries", &self.boundaries)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

impl InstrumentSpec {
    fn new(name: &str, kind: InstrumentKind, unit: &str, description: &str) -> Self {
        Self {
            descriptor: InstrumentDescriptor {
                name: name.to_string(),
                kind,
                unit: unit.to_string(),
                description: description.to_string(),
            },
            attribute_keys: Vec::new(),
            boundaries: None,
            callback: None,
        }
    }

    /// Counter spec
    pub fn counter(name: &str, unit: &str, description: &str) -> Self {
        Self::new(name, InstrumentKind::Counter, unit, description)
    }

    /// Histogram spec
    pub fn histogram(name: &str, unit: &str, description: &str) -> Self {
        Self::new(name, InstrumentKind::Histogram, unit, description)
    }

    /// Observable gauge spec with its callback
    pub fn gauge<F>(name: &str, unit: &str, description: &str, callback: F) -> Self
    where
        F: Fn() -> Vec<Observation> + Send + Sync + 'static,
    {
        Self {
            callback: Some(Arc::new(callback)),
            ..Self::new(name, InstrumentKind::ObservableGauge, unit, description)
        }
    }

    /// Declare the attribute keys recordings carry
    #[must_use]
    pub fn with_attribute_keys(mut self, keys: &[&str]) -> Self {
        self.attribute_keys = keys.iter().map(ToString::to_string).collect();
        self
    }

    /// Histogram bucket bounds
    #[must_use]
    pub fn with_boundaries(mut self, boundaries: Vec<f64>) -> Self {
        self.boundaries = Some(boundaries);
        self
    }

    fn validate(&self) -> Result<(), MetricsError> {
        validate_instrument_name(&self.descriptor.name)?;
        if let Some(boundaries) = &self.boundaries {
            validate_boundaries(boundaries)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Handle {
    Counter(Counter<u64>),
    Histogram(Histogram<f64>),
    ObservableGauge(ObservableGauge<f64>),
}

/// A registered instrument
#[derive(Debug, Clone)]
pub struct Instrument {
    descriptor: InstrumentDescriptor,
    handle: Handle,
}

impl Instrument {
    fn create(meter: &Meter, spec: InstrumentSpec) -> Self {
        let InstrumentSpec {
            descriptor,
            boundaries,
            callback,
            ..
        } = spec;
        let name = descriptor.name.clone();
        let unit = descriptor.unit.clone();
        let description = descriptor.description.clone();

        let handle = match descriptor.kind {
            InstrumentKind::Counter => Handle::Counter(
                meter
                    .u64_counter(name)
                    .with_unit(unit)
                    .with_description(description)
                    .build(),
            ),
            InstrumentKind::Histogram => {
                let builder = meter
                    .f64_histogram(name)
                    .with_unit(unit)
                    .with_description(description);
                let builder = match boundaries {
                    Some(boundaries) => builder.with_boundaries(boundaries),
                    None => builder,
                };
                Handle::Histogram(builder.build())
            },
            InstrumentKind::ObservableGauge => {
                let callback: GaugeCallback = match callback {
                    Some(callback) => callback,
                    None => Arc::new(Vec::<Observation>::new),
                };
                Handle::ObservableGauge(
                    meter
                        .f64_observable_gauge(name)
                        .with_unit(unit)
                        .with_description(description)
                        .with_callback(move |observer| {
                            for observation in callback() {
                                observer.observe(observation.value, &observation.attributes);
                            }
                        })
                        .build(),
                )
            },
        };

        Self { descriptor, handle }
    }

    /// Instrument identity
    pub const fn descriptor(&self) -> &InstrumentDescriptor {
        &self.descriptor
    }

    /// Counter handle, if this is a counter
    pub fn as_counter(&self) -> Option<&Counter<u64>> {
        match &self.handle {
            Handle::Counter(c) => Some(c),
            _ => None,
        }
    }

    /// Histogram handle, if this is a histogram
    pub fn as_histogram(&self) -> Option<&Histogram<f64>> {
        match &self.handle {
            Handle::Histogram(h) => Some(h),
            _ => None,
        }
    }

    /// Gauge handle, if this is an observable gauge
    pub fn as_gauge(&self) -> Option<&ObservableGauge<f64>> {
        match &self.handle {
            Handle::ObservableGauge(g) => Some(g),
            _ => None,
        }
    }
}

/// Register a list of instrument specs, keyed by instrument name
///
/// Every spec is validated before anything is registered. Repeating a name
/// with the same kind yields one instrument; a different kind is an error.
pub fn register_instruments(
    meter: &Meter,
    specs: impl IntoIterator<Item = InstrumentSpec>,
) -> Result<HashMap<String, Instrument>, MetricsError> {
    let mut unique: Vec<InstrumentSpec> = Vec::new();
    for spec in specs {
        spec.validate()?;
        match unique.iter().find(|s| s.descriptor.name == spec.descriptor.name) {
            Some(existing) if existing.descriptor.kind != spec.descriptor.kind => {
                return Err(MetricsError::ConflictingInstrument {
                    name: spec.descriptor.name,
                    existing: existing.descriptor.kind.as_str(),
                    requested: spec.descriptor.kind.as_str(),
                });
            },
            Some(_) => {},
            None => unique.push(spec),
        }
    }

    let instruments: HashMap<String, Instrument> = unique
        .into_iter()
        .map(|spec| {
            debug!(
                instrument = %spec.descriptor.name,
                kind = %spec.descriptor.kind,
                "Registering instrument"
            );
            (spec.descriptor.name.clone(), Instrument::create(meter, spec))
        })
        .collect();

    info!(count = instruments.len(), "Instruments registered");
    Ok(instruments)
}
