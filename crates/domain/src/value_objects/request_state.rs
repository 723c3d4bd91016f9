//! Success/failure classification of a served request

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether a request counts as successful for error-rate accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    /// Status below 400
    Success,
    /// Status 400 or above
    Fail,
}

impl RequestState {
    /// Classify an HTTP status code
    pub const fn from_status(status: u16) -> Self {
        if status >= 400 {
            Self::Fail
        } else {
            Self::Success
        }
    }

    /// Attribute value used on telemetry
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
