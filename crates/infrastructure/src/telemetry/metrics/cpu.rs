//! System-wide CPU utilization sampling for the utilization gauge.

use std::fmt;

use parking_lot::Mutex;
use sysinfo::{CpuRefreshKind, RefreshKind, System};

/// Samples host-wide CPU usage across all cores as a fraction in `[0, 1]`
///
/// Usage is computed between consecutive refreshes, so the first sample after
/// creation may read as zero.
pub struct CpuSampler {
    system: Mutex<System>,
}

impl fmt::Debug for CpuSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuSampler").finish_non_exhaustive()
    }
}

impl Default for CpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuSampler {
    /// Create a sampler and take the baseline reading
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing().with_cpu_usage()),
        );
        Self {
            system: Mutex::new(system),
        }
    }

    /// Current utilization as a fraction
    pub fn sample(&self) -> f64 {
        let mut system = self.system.lock();
        system.refresh_cpu_usage();
        normalize_percent(system.global_cpu_usage())
    }
}

/// Convert a percentage into a fraction clamped to `[0, 1]`
pub fn normalize_percent(percent: f32) -> f64 {
    if percent.is_finite() {
        (f64::from(percent) / 100.0).clamp(0.0, 1.0)
    } else {
        0.0
    }
}
