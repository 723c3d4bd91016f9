//! Chaos context for tracking fault injection statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::fault_profile::OutcomeClass;

/// What the chaos client did with one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionResult {
    /// Chaos was off; the call went straight upstream
    Passthrough,
    /// Latency injected, then delegated upstream
    Delegated,
    /// Latency injected, then a not-found was synthesized
    Failed,
}

impl InjectionResult {
    /// Map a sampled outcome to its injection result
    pub const fn from_outcome(outcome: OutcomeClass) -> Self {
        match outcome {
            OutcomeClass::Success => Self::Delegated,
            OutcomeClass::Fail => Self::Failed,
        }
    }
}

/// Snapshot of fault injection statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaosStats {
    /// Total number of calls processed
    pub total_calls: u64,
    /// Calls that bypassed injection because chaos was off
    pub passthrough: u64,
    /// Calls that received injected latency
    pub latency_injected: u64,
    /// Total latency added (milliseconds)
    pub total_latency_added_ms: u64,
    /// Calls answered with a synthetic not-found
    pub failures_injected: u64,
    /// Real upstream errors that were propagated
    pub dependency_errors: u64,
}

impl ChaosStats {
    /// Share of injected calls that were failed
    #[allow(clippy::cast_precision_loss)]
    pub fn actual_fault_rate(&self) -> f64 {
        if self.latency_injected == 0 {
            0.0
        } else {
            self.failures_injected as f64 / self.latency_injected as f64
        }
    }

    /// Mean injected latency in milliseconds
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_latency_ms(&self) -> f64 {
        if self.latency_injected == 0 {
            0.0
        } else {
            self.total_latency_added_ms as f64 / self.latency_injected as f64
        }
    }
}

/// Lock-free counters shared by every call through a chaos client
#[derive(Debug, Default)]
pub struct ChaosContext {
    total_calls: AtomicU64,
    passthrough: AtomicU64,
    latency_injected: AtomicU64,
    total_latency_added_ms: AtomicU64,
    failures_injected: AtomicU64,
    dependency_errors: AtomicU64,
}

impl ChaosContext {
    /// Create a new chaos context
    pub const fn new() -> Self {
        Self {
            total_calls: AtomicU64::new(0),
            passthrough: AtomicU64::new(0),
            latency_injected: AtomicU64::new(0),
            total_latency_added_ms: AtomicU64::new(0),
            failures_injected: AtomicU64::new(0),
            dependency_errors: AtomicU64::new(0),
        }
    }

    /// Record a call being processed
    pub fn record_call(&self, result: InjectionResult) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        match result {
            InjectionResult::Passthrough => {
                self.passthrough.fetch_add(1, Ordering::Relaxed);
            },
            InjectionResult::Failed => {
                self.failures_injected.fetch_add(1, Ordering::Relaxed);
            },
            InjectionResult::Delegated => {},
        }
    }

    /// Record a latency injection
    #[allow(clippy::cast_possible_truncation)]
    pub fn record_latency(&self, delay: Duration) {
        self.latency_injected.fetch_add(1, Ordering::Relaxed);
        self.total_latency_added_ms
            .fetch_add(delay.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record an upstream error passed back to the caller
    pub fn record_dependency_error(&self) {
        self.dependency_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a copy of current statistics
    pub fn stats_snapshot(&self) -> ChaosStats {
        ChaosStats {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            passthrough: self.passthrough.load(Ordering::Relaxed),
            latency_injected: self.latency_injected.load(Ordering::Relaxed),
            total_latency_added_ms: self.total_latency_added_ms.load(Ordering::Relaxed),
            failures_injected: self.failures_injected.load(Ordering::Relaxed),
            dependency_errors: self.dependency_errors.load(Ordering::Relaxed),
        }
    }

    /// Reset statistics
    pub fn reset(&self) {
        for counter in [
            &self.total_calls,
            &self.passthrough,
            &self.latency_injected,
            &self.total_latency_added_ms,
            &self.failures_injected,
            &self.dependency_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
