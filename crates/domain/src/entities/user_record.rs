//! User record entity
//!
//! The payload returned by the upstream user dependency. Records are built once by
//! the upstream client and never mutated afterwards.

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// A user as returned by the upstream data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    id: i64,
    name: String,
    address: String,
}

impl UserRecord {
    /// Create a new user record
    ///
    /// # Errors
    ///
    /// Returns a validation error if the name is blank.
    pub fn new(
        id: i64,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "user name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            id,
            name,
            address: address.into(),
        })
    }

    /// The user identifier
    pub const fn id(&self) -> i64 {
        self.id
    }

    /// The user's display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The user's postal address
    pub fn address(&self) -> &str {
        &self.address
    }
}
