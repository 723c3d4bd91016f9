//! Runtime toggle for fault injection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

/// Environment variable read by [`ChaosSwitch::from_env_or`]
pub const CHAOS_ENV_VAR: &str = "CHAOS";

/// Shared on/off switch for fault injection
///
/// Clones share the same flag. Reads happen once per call, so a toggle takes
/// effect for the next call without a restart.
#[derive(Debug, Clone, Default)]
pub struct ChaosSwitch {
    enabled: Arc<AtomicBool>,
}

impl ChaosSwitch {
    /// Create a switch with the given initial state
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    /// Create a switch from the `CHAOS` environment variable
    ///
    /// Falls back to `default` when the variable is unset.
    pub fn from_env_or(default: bool) -> Self {
        Self::new(env_flag().unwrap_or(default))
    }

    /// Whether injection is currently on
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Turn injection on or off
    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            info!(enabled, "Chaos mode toggled");
        }
    }
}

/// Parse a flag value; only `true` (any case) turns chaos on
pub fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// The `CHAOS` flag, if the variable is set
pub fn env_flag() -> Option<bool> {
    std::env::var(CHAOS_ENV_VAR).ok().map(|v| parse_flag(&v))
}
