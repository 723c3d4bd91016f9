//! User lookup port
//!
//! What request handlers call: a lookup that yields an outcome paired with the
//! HTTP status to serve. The fault-injecting client implements this in front of a
//! [`UserSourcePort`](super::UserSourcePort).

use async_trait::async_trait;
use domain::FetchOutcome;
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Port for looking up a user with a status code attached
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserLookupPort: Send + Sync {
    /// Look up the user with the given id
    ///
    /// Returns `(outcome, status)`. A synthetic `NotFound` is an `Ok` value;
    /// only real dependency failures are errors.
    async fn lookup_user(&self, id: i64) -> Result<(FetchOutcome, u16), ApplicationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn UserLookupPort) {}

    #[test]
    fn trait_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn UserLookupPort>();
    }

    #[test]
    fn synthetic_not_found_is_ok() {
        let mut mock = MockUserLookupPort::new();
        mock.expect_lookup_user()
            .returning(|_| Ok((FetchOutcome::NotFound, 404)));

        let (outcome, status) = tokio_test::block_on(mock.lookup_user(1)).unwrap();
        assert_eq!(outcome, FetchOutcome::NotFound);
        assert_eq!(status, 404);
    }
}
