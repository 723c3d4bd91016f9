//! Upstream user dependency port
//!
//! The single capability the fault injector decorates: fetch a record by id.

use async_trait::async_trait;
use domain::UserRecord;
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Port for the upstream user data source
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserSourcePort: Send + Sync {
    /// Fetch the user with the given id
    ///
    /// Failures of the dependency itself are reported as
    /// [`ApplicationError::Dependency`].
    async fn fetch_user(&self, id: i64) -> Result<UserRecord, ApplicationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn UserSourcePort) {}

    #[test]
    fn trait_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn UserSourcePort>();
    }

    #[tokio::test]
    async fn mock_returns_record() {
        let mut mock = MockUserSourcePort::new();
        mock.expect_fetch_user()
            .withf(|id| *id == 5)
            .returning(|id| Ok(UserRecord::new(id, "Mock", "Street").unwrap()));

        let record = mock.fetch_user(5).await.unwrap();
        assert_eq!(record.id(), 5);
    }
}
