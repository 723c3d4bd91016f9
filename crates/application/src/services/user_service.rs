//! User service - shapes a lookup into a response payload

use std::{fmt, sync::Arc};

use domain::UserRecord;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{error::ApplicationError, ports::UserLookupPort};

/// JSON view of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    /// User id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Postal address
    pub address: String,
}

impl From<UserRecord> for UserView {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id(),
            name: record.name().to_string(),
            address: record.address().to_string(),
        }
    }
}

/// A shaped response: status code plus optional user payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserResponse {
    /// HTTP status to serve
    pub status: u16,
    /// User payload; `None` renders as an empty object
    pub body: Option<UserView>,
}

impl UserResponse {
    /// Render the payload as JSON (`{}` when there is no user)
    pub fn body_json(&self) -> serde_json::Value {
        self.body
            .as_ref()
            .and_then(|view| serde_json::to_value(view).ok())
            .unwrap_or_else(|| serde_json::json!({}))
    }
}

/// Service that fetches users through a lookup port
pub struct UserService {
    lookup: Arc<dyn UserLookupPort>,
}

impl fmt::Debug for UserService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserService").finish_non_exhaustive()
    }
}

impl UserService {
    /// Create a new user service
    pub fn new(lookup: Arc<dyn UserLookupPort>) -> Self {
        Self { lookup }
    }

    /// Fetch a user and shape the result
    ///
    /// Dependency errors are returned as-is so the caller can serve a 5xx.
    #[instrument(skip(self))]
    pub async fn get_user(&self, id: i64) -> Result<UserResponse, ApplicationError> {
        let (outcome, status) = self.lookup.lookup_user(id).await?;
        let body = outcome.into_record().map(UserView::from);

        debug!(status, found = body.is_some(), "User lookup complete");

        Ok(UserResponse { status, body })
    }
}
