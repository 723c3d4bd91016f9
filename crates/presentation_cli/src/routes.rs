//! In-process request handlers driven by the simulator.

use std::sync::Arc;
use std::time::Duration;

use application::{ApplicationError, UserResponse, UserService};
use infrastructure::telemetry::trace::{Carrier, HeaderPropagator, SpanKind};
use infrastructure::telemetry::{InboundRequest, RequestObserver, ResponseStatus};
use tracing::debug;

/// Route template of the root handler
pub const INDEX_ROUTE: &str = "/";
/// Route template of the user handler
pub const USER_ROUTE: &str = "/users/{id}";

/// Simulated round trip of the outbound call made by the root handler
pub const OUTBOUND_DELAY: Duration = Duration::from_millis(100);

/// Result of the root handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexResponse {
    /// Status served
    pub status: u16,
    /// Headers the outbound call was sent with
    pub outbound_headers: Carrier,
}

impl ResponseStatus for IndexResponse {
    fn status(&self) -> u16 {
        self.status
    }
}

/// The two routes, wired to the observer
#[derive(Debug, Clone)]
pub struct Routes {
    observer: RequestObserver,
    users: Arc<UserService>,
}

impl Routes {
    /// Create the routes
    pub fn new(observer: RequestObserver, users: Arc<UserService>) -> Self {
        Self { observer, users }
    }

    /// `GET /`
    ///
    /// Counts traffic, then makes a traced outbound call that carries the
    /// trace context in its headers.
    pub async fn index(&self, headers: Carrier) -> IndexResponse {
        let request = InboundRequest::get(INDEX_ROUTE, INDEX_ROUTE).with_headers(headers);
        let tracer = self.observer.tracer().clone();
        let instruments = self.observer.instruments().clone();
        let propagator = self.observer.propagator().clone();

        self.observer
            .observe(&request, |_span| async move {
                instruments.record_traffic(INDEX_ROUTE);
                let outbound_headers = tracer
                    .in_span("do_stuff", SpanKind::Internal, |_| outbound_call(propagator))
                    .await;
                IndexResponse {
                    status: 200,
                    outbound_headers,
                }
            })
            .await
    }

    /// `GET /users/{id}`
    pub async fn get_user(&self, id: i64, headers: Carrier) -> Result<UserResponse, ApplicationError> {
        let request = InboundRequest::get(format!("/users/{id}"), USER_ROUTE).with_headers(headers);
        let users = self.users.clone();

        self.observer
            .observe(&request, |_span| async move { users.get_user(id).await })
            .await
    }
}

async fn outbound_call(propagator: HeaderPropagator) -> Carrier {
    let mut headers = Carrier::new();
    propagator.inject_current(&mut headers);
    debug!(?headers, "Sending outbound request");
    tokio::time::sleep(OUTBOUND_DELAY).await;
    headers
}
