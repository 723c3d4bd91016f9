//! Statistical tests for fault profile sampling

#![allow(clippy::expect_used, clippy::cast_precision_loss)]

use std::collections::HashMap;
use std::time::Duration;

use infrastructure::chaos::{FaultProfile, LatencyClass, LatencyTier, OutcomeClass};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

const SAMPLES: usize = 100_000;
const TOLERANCE: f64 = 0.01;

fn latency_frequencies(profile: &FaultProfile, seed: u64, samples: usize) -> HashMap<LatencyClass, f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut counts: HashMap<LatencyClass, usize> = HashMap::new();
    for _ in 0..samples {
        *counts.entry(profile.sample_latency(&mut rng).class).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(class, n)| (class, n as f64 / samples as f64))
        .collect()
}

fn profile(fast: f64, medium: f64, slow: f64, fail: f64) -> FaultProfile {
    FaultProfile::new(
        Duration::from_millis(50),
        vec![
            (LatencyTier::from_millis(LatencyClass::Fast, 100), fast),
            (LatencyTier::from_millis(LatencyClass::Medium, 300), medium),
            (LatencyTier::from_millis(LatencyClass::Slow, 2000), slow),
        ],
        vec![(OutcomeClass::Success, 1.0 - fail), (OutcomeClass::Fail, fail)],
    )
    .expect("valid profile")
}

#[test]
fn default_latency_classes_match_configured_probabilities() {
    let frequencies = latency_frequencies(&FaultProfile::default(), 42, SAMPLES);

    for (class, expected) in [
        (LatencyClass::Fast, 0.80),
        (LatencyClass::Medium, 0.15),
        (LatencyClass::Slow, 0.05),
    ] {
        let observed = frequencies.get(&class).copied().unwrap_or_default();
        assert!(
            (observed - expected).abs() <= TOLERANCE,
            "{class}: observed {observed}, expected {expected}"
        );
    }
}

#[test]
fn default_outcomes_match_configured_probabilities() {
    let profile = FaultProfile::default();
    let mut rng = StdRng::seed_from_u64(7);
    let fails = (0..SAMPLES)
        .filter(|_| profile.sample_outcome(&mut rng) == OutcomeClass::Fail)
        .count();

    let observed = fails as f64 / SAMPLES as f64;
    let expected = profile
        .outcomes()
        .entries()
        .iter()
        .find(|(class, _)| *class == OutcomeClass::Fail)
        .map(|(_, p)| *p)
        .expect("fail class");
    assert!((observed - expected).abs() <= TOLERANCE);
}

#[test]
fn sampled_delay_is_base_plus_class_delay() {
    let profile = FaultProfile::default();
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..1_000 {
        let sample = profile.sample_latency(&mut rng);
        let expected = match sample.class {
            LatencyClass::Fast => 150,
            LatencyClass::Medium => 350,
            LatencyClass::Slow => 2050,
        };
        assert_eq!(sample.total, Duration::from_millis(expected));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn frequencies_track_any_valid_distribution(
        fast in 0.05f64..0.9,
        split in 0.0f64..1.0,
        fail in 0.0f64..1.0,
        seed in any::<u64>(),
    ) {
        let rest = 1.0 - fast;
        let medium = rest * split;
        let slow = rest - medium;
        let profile = profile(fast, medium, slow, fail);

        let frequencies = latency_frequencies(&profile, seed, 20_000);
        for (class, expected) in [
            (LatencyClass::Fast, fast),
            (LatencyClass::Medium, medium),
            (LatencyClass::Slow, slow),
        ] {
            let observed = frequencies.get(&class).copied().unwrap_or_default();
            prop_assert!((observed - expected).abs() <= 0.03, "{} {} {}", class, observed, expected);
        }
    }

    #[test]
    fn zero_probability_class_is_never_sampled(seed in any::<u64>()) {
        let profile = profile(0.5, 0.5, 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..1_000 {
            prop_assert_ne!(profile.sample_latency(&mut rng).class, LatencyClass::Slow);
            prop_assert_eq!(profile.sample_outcome(&mut rng), OutcomeClass::Success);
        }
    }
}
