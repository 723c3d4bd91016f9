//! Stub upstream that fabricates user records.

use std::sync::atomic::{AtomicBool, Ordering};

use application::{ApplicationError, ports::UserSourcePort};
use async_trait::async_trait;
use domain::UserRecord;
use rand::{Rng, seq::IndexedRandom};
use tracing::{debug, instrument};

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Barbara", "Claude", "Donald", "Edsger", "Frances", "Grace", "John",
    "Katherine", "Leslie", "Margaret", "Niklaus", "Radia", "Tony",
];

const LAST_NAMES: &[&str] = &[
    "Allen", "Dijkstra", "Hamilton", "Hopper", "Hoare", "Johnson", "Knuth", "Lamport",
    "Liskov", "Lovelace", "McCarthy", "Perlman", "Shannon", "Turing", "Wirth",
];

const STREETS: &[&str] = &[
    "Analytical Lane", "Babbage Road", "Compiler Court", "Debugger Drive", "Kernel Street",
    "Lambda Avenue", "Mainframe Way", "Packet Place", "Register Row", "Semaphore Square",
];

const CITIES: &[&str] = &[
    "Bletchley", "Cambridge", "Palo Alto", "Princeton", "Zurich", "Boston", "Eindhoven",
];

/// Upstream stub returning a random name and address for any requested id
///
/// Setting it unavailable makes every call fail with a dependency error.
#[derive(Debug)]
pub struct FakerUserClient {
    available: AtomicBool,
}

impl Default for FakerUserClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakerUserClient {
    /// Create an available stub
    pub const fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
        }
    }

    /// Create a stub that fails every call
    pub const fn unavailable() -> Self {
        Self {
            available: AtomicBool::new(false),
        }
    }

    /// Mark the stub available or not
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Whether calls currently succeed
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    fn fabricate<R: Rng + ?Sized>(rng: &mut R) -> (String, String) {
        let pick = |list: &[&'static str], rng: &mut R| list.choose(rng).copied().unwrap_or("Unknown");

        let name = format!("{} {}", pick(FIRST_NAMES, rng), pick(LAST_NAMES, rng));
        let number: u16 = rng.random_range(1..=999);
        let zip: u32 = rng.random_range(10_000..=99_999);
        let address = format!(
            "{number} {}\n{} {zip}",
            pick(STREETS, rng),
            pick(CITIES, rng)
        );
        (name, address)
    }
}

#[async_trait]
impl UserSourcePort for FakerUserClient {
    #[instrument(skip(self))]
    async fn fetch_user(&self, id: i64) -> Result<UserRecord, ApplicationError> {
        if !self.is_available() {
            return Err(ApplicationError::Dependency(
                "user source unavailable".to_string(),
            ));
        }

        let (name, address) = Self::fabricate(&mut rand::rng());
        debug!(%name, "Fabricated user record");

        Ok(UserRecord::new(id, name, address)?)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[tokio::test]
    async fn returns_requested_id() {
        let client = FakerUserClient::new();
        let record = client.fetch_user(123).await.unwrap();
        assert_eq!(record.id(), 123);
        assert!(!record.name().is_empty());
        assert!(!record.address().is_empty());
    }

    #[tokio::test]
    async fn unavailable_returns_dependency_error() {
        let client = FakerUserClient::unavailable();
        let err = client.fetch_user(1).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Dependency(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn availability_can_be_toggled() {
        let client = FakerUserClient::new();
        client.set_available(false);
        assert!(client.fetch_user(1).await.is_err());
        client.set_available(true);
        assert!(client.fetch_user(1).await.is_ok());
    }

    #[test]
    fn fabricated_name_has_two_parts() {
        let mut rng = StdRng::seed_from_u64(42);
        let (name, address) = FakerUserClient::fabricate(&mut rng);
        assert_eq!(name.split(' ').count(), 2);
        assert!(address.contains('\n'));
    }
}
