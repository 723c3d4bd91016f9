//! Fault profile definitions for chaos engineering.
//!
//! A profile is two independent discrete distributions: one over latency classes
//! (each with a fixed delay added on top of a base delay) and one over outcome
//! classes. Both are validated when the profile is built.

use std::fmt;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Allowed deviation of a distribution's probability sum from 1.0
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Errors raised while building a fault profile
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChaosConfigError {
    /// Distribution has no entries
    #[error("{distribution} distribution has no entries")]
    EmptyDistribution { distribution: &'static str },

    /// A probability is outside [0, 1] or not finite
    #[error("{distribution} distribution has invalid probability {value}")]
    InvalidProbability {
        distribution: &'static str,
        value: f64,
    },

    /// Probabilities do not sum to 1
    #[error("{distribution} distribution probabilities sum to {sum}, expected 1")]
    ProbabilitySum { distribution: &'static str, sum: f64 },

    /// The same class appears twice
    #[error("{distribution} distribution lists class '{class}' more than once")]
    DuplicateClass {
        distribution: &'static str,
        class: String,
    },
}

/// Latency classes a call can be assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyClass {
    /// Short delay
    Fast,
    /// Noticeable delay
    Medium,
    /// Long delay
    Slow,
}

impl fmt::Display for LatencyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => f.write_str("fast"),
            Self::Medium => f.write_str("medium"),
            Self::Slow => f.write_str("slow"),
        }
    }
}

/// Outcome classes a call can be assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeClass {
    /// Delegate to the upstream dependency
    Success,
    /// Synthesize a not-found response
    Fail,
}

impl fmt::Display for OutcomeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Fail => f.write_str("fail"),
        }
    }
}

/// A latency class with its fixed delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyTier {
    /// Class name
    pub class: LatencyClass,
    /// Delay added on top of the base delay
    pub delay: Duration,
}

impl LatencyTier {
    /// Create a tier from a delay in milliseconds
    pub const fn from_millis(class: LatencyClass, delay_ms: u64) -> Self {
        Self {
            class,
            delay: Duration::from_millis(delay_ms),
        }
    }
}

impl fmt::Display for LatencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class)
    }
}

/// A discrete probability distribution over a small set of values
#[derive(Debug, Clone)]
pub struct DiscreteDistribution<T> {
    entries: Vec<(T, f64)>,
    cumulative: Vec<f64>,
}

impl<T: fmt::Display> DiscreteDistribution<T> {
    /// Build and validate a distribution
    ///
    /// Every probability must be finite and within `[0, 1]`, class names must be
    /// unique, and the total must be 1 within [`PROBABILITY_TOLERANCE`].
    pub fn new(
        distribution: &'static str,
        entries: Vec<(T, f64)>,
    ) -> Result<Self, ChaosConfigError> {
        if entries.is_empty() {
            return Err(ChaosConfigError::EmptyDistribution { distribution });
        }

        let mut seen: Vec<String> = Vec::with_capacity(entries.len());
        let mut cumulative = Vec::with_capacity(entries.len());
        let mut sum = 0.0;

        for (value, probability) in &entries {
            if !probability.is_finite() || !(0.0..=1.0).contains(probability) {
                return Err(ChaosConfigError::InvalidProbability {
                    distribution,
                    value: *probability,
                });
            }

            let class = value.to_string();
            if seen.contains(&class) {
                return Err(ChaosConfigError::DuplicateClass {
                    distribution,
                    class,
                });
            }
            seen.push(class);

            sum += probability;
            cumulative.push(sum);
        }

        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(ChaosConfigError::ProbabilitySum { distribution, sum });
        }

        Ok(Self {
            entries,
            cumulative,
        })
    }
}

impl<T> DiscreteDistribution<T> {
    /// Draw one value using the given random source
    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> &T {
        let u: f64 = rng.random();

        for ((value, _), bound) in self.entries.iter().zip(&self.cumulative) {
            if u < *bound {
                return value;
            }
        }

        // Rounding left u above the final bound; fall back to the last class that
        // can actually occur.
        self.entries
            .iter()
            .rev()
            .find(|(_, p)| *p > 0.0)
            .or_else(|| self.entries.last())
            .map(|(value, _)| value)
            .unwrap_or_else(|| unreachable!("distribution is never empty"))
    }

    /// All entries with their probabilities
    pub fn entries(&self) -> &[(T, f64)] {
        &self.entries
    }
}

/// The delay chosen for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySample {
    /// Sampled class
    pub class: LatencyClass,
    /// Base delay plus the class delay
    pub total: Duration,
}

/// Fault injection profile: latency and outcome distributions plus a base delay
#[derive(Debug, Clone)]
pub struct FaultProfile {
    base_delay: Duration,
    latency: DiscreteDistribution<LatencyTier>,
    outcomes: DiscreteDistribution<OutcomeClass>,
}

impl FaultProfile {
    /// Build a validated profile
    pub fn new(
        base_delay: Duration,
        latency: Vec<(LatencyTier, f64)>,
        outcomes: Vec<(OutcomeClass, f64)>,
    ) -> Result<Self, ChaosConfigError> {
        Ok(Self {
            base_delay,
            latency: DiscreteDistribution::new("latency", latency)?,
            outcomes: DiscreteDistribution::new("outcome", outcomes)?,
        })
    }

    /// A profile that always picks the given tier and outcome
    pub fn fixed(base_delay: Duration, tier: LatencyTier, outcome: OutcomeClass) -> Self {
        Self {
            base_delay,
            latency: DiscreteDistribution {
                entries: vec![(tier, 1.0)],
                cumulative: vec![1.0],
            },
            outcomes: DiscreteDistribution {
                entries: vec![(outcome, 1.0)],
                cumulative: vec![1.0],
            },
        }
    }

    /// Base delay applied to every injected call
    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Latency distribution
    pub const fn latency(&self) -> &DiscreteDistribution<LatencyTier> {
        &self.latency
    }

    /// Outcome distribution
    pub const fn outcomes(&self) -> &DiscreteDistribution<OutcomeClass> {
        &self.outcomes
    }

    /// Sample the delay for one call
    pub fn sample_latency<R: Rng + ?Sized>(&self, rng: &mut R) -> LatencySample {
        let tier = self.latency.sample_with(rng);
        LatencySample {
            class: tier.class,
            total: self.base_delay + tier.delay,
        }
    }

    /// Sample the outcome for one call
    pub fn sample_outcome<R: Rng + ?Sized>(&self, rng: &mut R) -> OutcomeClass {
        *self.outcomes.sample_with(rng)
    }
}

impl Default for FaultProfile {
    fn default() -> Self {
        FaultProfileConfig::default()
            .build()
            .unwrap_or_else(|e| unreachable!("built-in fault profile is valid: {e}"))
    }
}

/// Serializable form of a latency class entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyClassConfig {
    /// Class name
    pub class: LatencyClass,
    /// Probability of this class
    pub probability: f64,
    /// Delay in milliseconds
    pub delay_ms: u64,
}

/// Serializable form of an outcome class entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeClassConfig {
    /// Class name
    pub class: OutcomeClass,
    /// Probability of this class
    pub probability: f64,
}

/// Serializable fault profile, as found in configuration files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultProfileConfig {
    /// Delay applied to every injected call in milliseconds (default: 50)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Latency classes (default: fast 80%/100ms, medium 15%/300ms, slow 5%/2000ms)
    #[serde(default = "default_latency_classes")]
    pub latency: Vec<LatencyClassConfig>,

    /// Outcome classes (default: success 90%, fail 10%)
    #[serde(default = "default_outcome_classes")]
    pub outcomes: Vec<OutcomeClassConfig>,
}

const fn default_base_delay_ms() -> u64 {
    50
}

fn default_latency_classes() -> Vec<LatencyClassConfig> {
    vec![
        LatencyClassConfig {
            class: LatencyClass::Fast,
            probability: 0.80,
            delay_ms: 100,
        },
        LatencyClassConfig {
            class: LatencyClass::Medium,
            probability: 0.15,
            delay_ms: 300,
        },
        LatencyClassConfig {
            class: LatencyClass::Slow,
            probability: 0.05,
            delay_ms: 2000,
        },
    ]
}

fn default_outcome_classes() -> Vec<OutcomeClassConfig> {
    vec![
        OutcomeClassConfig {
            class: OutcomeClass::Success,
            probability: 0.90,
        },
        OutcomeClassConfig {
            class: OutcomeClass::Fail,
            probability: 0.10,
        },
    ]
}

impl Default for FaultProfileConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            latency: default_latency_classes(),
            outcomes: default_outcome_classes(),
        }
    }
}

impl FaultProfileConfig {
    /// Validate and convert into a [`FaultProfile`]
    pub fn build(&self) -> Result<FaultProfile, ChaosConfigError> {
        FaultProfile::new(
            Duration::from_millis(self.base_delay_ms),
            self.latency
                .iter()
                .map(|c| (LatencyTier::from_millis(c.class, c.delay_ms), c.probability))
                .collect(),
            self.outcomes
                .iter()
                .map(|c| (c.class, c.probability))
                .collect(),
        )
    }
}
