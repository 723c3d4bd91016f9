//! Fault-injecting decorator around the upstream user source.

use std::fmt;
use std::sync::Arc;

use application::{
    ApplicationError,
    ports::{UserLookupPort, UserSourcePort},
};
use async_trait::async_trait;
use domain::{FetchOutcome, STATUS_NOT_FOUND, STATUS_OK};
use tracing::{debug, instrument, warn};

use super::{
    ChaosContext, ChaosStats, ChaosSwitch, FaultProfile, InjectionResult, OutcomeClass,
};

/// Wraps a [`UserSourcePort`] and, when chaos is on, delays calls and fails some
/// of them with a synthetic not-found.
pub struct ChaosClient {
    upstream: Arc<dyn UserSourcePort>,
    profile: FaultProfile,
    switch: ChaosSwitch,
    context: ChaosContext,
}

impl fmt::Debug for ChaosClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChaosClient")
            .field("enabled", &self.switch.is_enabled())
            .field("base_delay", &self.profile.base_delay())
            .finish_non_exhaustive()
    }
}

impl ChaosClient {
    /// Create a chaos client with the given profile and switch
    pub fn new(upstream: Arc<dyn UserSourcePort>, profile: FaultProfile, switch: ChaosSwitch) -> Self {
        Self {
            upstream,
            profile,
            switch,
            context: ChaosContext::new(),
        }
    }

    /// Create a chaos client using the built-in profile
    pub fn with_default_profile(upstream: Arc<dyn UserSourcePort>, switch: ChaosSwitch) -> Self {
        Self::new(upstream, FaultProfile::default(), switch)
    }

    /// The switch controlling injection
    pub const fn switch(&self) -> &ChaosSwitch {
        &self.switch
    }

    /// The active fault profile
    pub const fn profile(&self) -> &FaultProfile {
        &self.profile
    }

    /// Get a copy of current statistics
    pub fn stats(&self) -> ChaosStats {
        self.context.stats_snapshot()
    }

    async fn delegate(&self, id: i64) -> Result<(FetchOutcome, u16), ApplicationError> {
        match self.upstream.fetch_user(id).await {
            Ok(record) => Ok((FetchOutcome::Success(record), STATUS_OK)),
            Err(e) => {
                self.context.record_dependency_error();
                warn!(id, error = %e, "Upstream user source failed");
                Err(e)
            },
        }
    }
}

#[async_trait]
impl UserLookupPort for ChaosClient {
    #[instrument(skip(self), fields(chaos = tracing::field::Empty))]
    async fn lookup_user(&self, id: i64) -> Result<(FetchOutcome, u16), ApplicationError> {
        if !self.switch.is_enabled() {
            tracing::Span::current().record("chaos", false);
            self.context.record_call(InjectionResult::Passthrough);
            return self.delegate(id).await;
        }
        tracing::Span::current().record("chaos", true);

        // The thread-local rng must not live across the sleep below.
        let (latency, outcome) = {
            let mut rng = rand::rng();
            let latency = self.profile.sample_latency(&mut rng);
            let outcome = self.profile.sample_outcome(&mut rng);
            (latency, outcome)
        };

        debug!(
            class = %latency.class,
            delay_ms = latency.total.as_millis(),
            %outcome,
            "Injecting fault"
        );

        self.context.record_latency(latency.total);
        tokio::time::sleep(latency.total).await;
        self.context.record_call(InjectionResult::from_outcome(outcome));

        match outcome {
            OutcomeClass::Success => self.delegate(id).await,
            OutcomeClass::Fail => Ok((FetchOutcome::NotFound, STATUS_NOT_FOUND)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use domain::UserRecord;
    use tokio::time::Instant;

    use super::*;
    use crate::chaos::{LatencyClass, LatencyTier};

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl UserSourcePort for CountingSource {
        async fn fetch_user(&self, id: i64) -> Result<UserRecord, ApplicationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ApplicationError::Dependency("offline".to_string()));
            }
            Ok(UserRecord::new(id, "Grace", "1 Navy Yard").unwrap())
        }
    }

    fn fixed_profile(outcome: OutcomeClass) -> FaultProfile {
        FaultProfile::fixed(
            Duration::from_millis(50),
            LatencyTier::from_millis(LatencyClass::Fast, 100),
            outcome,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_passes_through_without_delay() {
        let source = CountingSource::new(false);
        let client = ChaosClient::new(
            source.clone(),
            fixed_profile(OutcomeClass::Fail),
            ChaosSwitch::new(false),
        );

        let start = Instant::now();
        let (outcome, status) = client.lookup_user(123).await.unwrap();

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(status, 200);
        assert_eq!(outcome.record().unwrap().id(), 123);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.stats().passthrough, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn enabled_success_delays_then_delegates() {
        let source = CountingSource::new(false);
        let client = ChaosClient::new(
            source.clone(),
            fixed_profile(OutcomeClass::Success),
            ChaosSwitch::new(true),
        );

        let start = Instant::now();
        let (outcome, status) = client.lookup_user(7).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(150));
        assert_eq!(status, 200);
        assert_eq!(outcome.record().unwrap().name(), "Grace");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        let stats = client.stats();
        assert_eq!(stats.latency_injected, 1);
        assert_eq!(stats.total_latency_added_ms, 150);
    }

    #[tokio::test(start_paused = true)]
    async fn enabled_fail_skips_upstream() {
        let source = CountingSource::new(false);
        let client = ChaosClient::new(
            source.clone(),
            fixed_profile(OutcomeClass::Fail),
            ChaosSwitch::new(true),
        );

        let (outcome, status) = client.lookup_user(7).await.unwrap();

        assert_eq!(outcome, FetchOutcome::NotFound);
        assert_eq!(status, 404);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(client.stats().failures_injected, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_applies_to_next_call() {
        let source = CountingSource::new(false);
        let switch = ChaosSwitch::new(false);
        let client = ChaosClient::new(source, fixed_profile(OutcomeClass::Fail), switch.clone());

        assert_eq!(client.lookup_user(1).await.unwrap().1, 200);
        switch.set_enabled(true);
        assert_eq!(client.lookup_user(1).await.unwrap().1, 404);
        switch.set_enabled(false);
        assert_eq!(client.lookup_user(1).await.unwrap().1, 200);
    }

    #[tokio::test(start_paused = true)]
    async fn upstream_error_propagates() {
        let source = CountingSource::new(true);
        let client = ChaosClient::new(
            source,
            fixed_profile(OutcomeClass::Success),
            ChaosSwitch::new(true),
        );

        let err = client.lookup_user(1).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Dependency(_)));
        assert_eq!(client.stats().dependency_errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_does_not_block_other_tasks() {
        let client = Arc::new(ChaosClient::new(
            CountingSource::new(false),
            fixed_profile(OutcomeClass::Success),
            ChaosSwitch::new(true),
        ));

        let start = Instant::now();
        let handles: Vec<_> = (0..10)
            .map(|id| {
                let client = client.clone();
                tokio::spawn(async move { client.lookup_user(id).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Ten concurrent 150ms delays overlap rather than add up.
        assert!(start.elapsed() < Duration::from_millis(300));
    }

    #[test]
    fn debug_shows_state() {
        let client = ChaosClient::with_default_profile(CountingSource::new(false), ChaosSwitch::new(true));
        let debug = format!("{client:?}");
        assert!(debug.contains("ChaosClient"));
        assert!(debug.contains("enabled: true"));
    }
}
