//! Outcome of a single user fetch

use serde::{Deserialize, Serialize};

use crate::entities::UserRecord;

/// HTTP status paired with a successful fetch
pub const STATUS_OK: u16 = 200;

/// HTTP status paired with a missing record
pub const STATUS_NOT_FOUND: u16 = 404;

/// Result of asking for a user record
///
/// `NotFound` is a designed outcome, not an error: it is what callers see when a
/// failure is synthesized in front of the upstream dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "record", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// The record was found
    Success(UserRecord),
    /// No record is available
    NotFound,
}

impl FetchOutcome {
    /// The HTTP status code that accompanies this outcome
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Success(_) => STATUS_OK,
            Self::NotFound => STATUS_NOT_FOUND,
        }
    }

    /// Borrow the record, if any
    pub const fn record(&self) -> Option<&UserRecord> {
        match self {
            Self::Success(record) => Some(record),
            Self::NotFound => None,
        }
    }

    /// Take the record, if any
    pub fn into_record(self) -> Option<UserRecord> {
        match self {
            Self::Success(record) => Some(record),
            Self::NotFound => None,
        }
    }

    /// Whether the fetch produced a record
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}
