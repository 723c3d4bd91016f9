//! Before/after hooks around an inbound request handler.

use std::fmt;
use std::future::Future;

use application::{ApplicationError, UserResponse};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::metrics::RequestInstruments;
use super::trace::{Carrier, HeaderPropagator, Span, SpanKind, Status, Tracer, with_active_span};

/// Span attribute for the request method
pub const ATTR_HTTP_METHOD: &str = "http.request.method";
/// Span attribute for the request path
pub const ATTR_URL_PATH: &str = "url.path";
/// Span attribute for the request scheme
pub const ATTR_URL_SCHEME: &str = "url.scheme";
/// Span attribute for the host the request was addressed to
pub const ATTR_SERVER_ADDRESS: &str = "server.address";
/// Span attribute for the final status code
pub const ATTR_HTTP_STATUS: &str = "http.response.status_code";

/// Inbound request metadata as seen by the observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    /// Request method, e.g. `GET`
    pub method: String,
    /// Concrete request path
    pub path: String,
    /// Route template the path matched, e.g. `/users/{id}`
    pub route: String,
    /// Request scheme
    pub scheme: String,
    /// Host header value
    pub host: String,
    /// Inbound headers, used to extract a remote parent
    pub headers: Carrier,
}

impl InboundRequest {
    /// A `GET` request for `path` matched by `route`, over http on localhost
    pub fn get(path: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.into(),
            route: route.into(),
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            headers: Carrier::new(),
        }
    }

    /// Attach inbound headers
    #[must_use]
    pub fn with_headers(mut self, headers: Carrier) -> Self {
        self.headers = headers;
        self
    }

    /// Name of the server span for this request
    pub fn span_name(&self) -> String {
        format!("{} {}", self.method, self.route)
    }
}

/// Status code a handler result is served with
pub trait ResponseStatus {
    /// HTTP status code
    fn status(&self) -> u16;
}

impl ResponseStatus for u16 {
    fn status(&self) -> u16 {
        *self
    }
}

impl ResponseStatus for UserResponse {
    fn status(&self) -> u16 {
        self.status
    }
}

impl ResponseStatus for ApplicationError {
    fn status(&self) -> u16 {
        self.status_code()
    }
}

impl<T: ResponseStatus, E: ResponseStatus> ResponseStatus for Result<T, E> {
    fn status(&self) -> u16 {
        match self {
            Ok(value) => value.status(),
            Err(err) => err.status(),
        }
    }
}

/// Wraps request handlers with a server span and request metrics
#[derive(Clone)]
pub struct RequestObserver {
    tracer: Tracer,
    instruments: RequestInstruments,
    propagator: HeaderPropagator,
}

impl fmt::Debug for RequestObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestObserver")
            .field("tracer", &self.tracer)
            .finish_non_exhaustive()
    }
}

impl RequestObserver {
    /// Create an observer
    pub fn new(tracer: Tracer, instruments: RequestInstruments) -> Self {
        Self {
            tracer,
            instruments,
            propagator: HeaderPropagator::new(),
        }
    }

    /// Tracer used for server spans
    pub const fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Instruments updated on completion
    pub const fn instruments(&self) -> &RequestInstruments {
        &self.instruments
    }

    /// Propagator used on inbound headers
    pub const fn propagator(&self) -> &HeaderPropagator {
        &self.propagator
    }

    /// Run `handler` inside a server span and record the request
    ///
    /// The span continues the trace from the inbound headers when they carry a
    /// valid context. The handler's span is active for its whole duration.
    pub async fn observe<F, Fut, T>(&self, request: &InboundRequest, handler: F) -> T
    where
        F: FnOnce(Span) -> Fut,
        Fut: Future<Output = T>,
        T: ResponseStatus,
    {
        let started = Instant::now();
        let remote = self.propagator.extract_or_root(&request.headers);
        let span = self
            .tracer
            .start_with_remote_parent(request.span_name(), remote.as_ref(), SpanKind::Server);

        span.set_attribute(ATTR_HTTP_METHOD, request.method.clone());
        span.set_attribute(ATTR_URL_PATH, request.path.clone());
        span.set_attribute(ATTR_URL_SCHEME, request.scheme.clone());
        span.set_attribute(ATTR_SERVER_ADDRESS, request.host.clone());

        let output = with_active_span(span.clone(), handler(span.clone())).await;
        let status = output.status();

        span.set_attribute(ATTR_HTTP_STATUS, i64::from(status));
        if status >= 500 {
            span.set_status(Status::error(format!("server error {status}")));
        }
        if let Err(e) = span.end() {
            warn!(error = %e, route = %request.route, "Failed to end request span");
        }

        let elapsed = started.elapsed().as_secs_f64();
        self.instruments
            .record_request(&request.route, &request.method, status, elapsed);

        debug!(
            method = %request.method,
            route = %request.route,
            status,
            elapsed_secs = elapsed,
            "Request observed"
        );

        output
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use opentelemetry::Value;

    use super::*;
    use crate::telemetry::metrics::{
        ATTR_ROUTE, CpuSampler, DURATION_BUCKETS, ERROR_RATE, REQUEST_DURATION, find_point,
    };
    use crate::telemetry::testing::{TestTelemetry, span_attribute};
    use crate::telemetry::trace::{SpanId, TRACEPARENT_HEADER, current_span};

    fn observer() -> (RequestObserver, TestTelemetry) {
        let telemetry = TestTelemetry::new("observer-test");
        let instruments =
            RequestInstruments::register(telemetry.meter(), Arc::new(CpuSampler::new()), DURATION_BUCKETS)
                .unwrap();
        (RequestObserver::new(telemetry.tracer().clone(), instruments), telemetry)
    }

    #[tokio::test(start_paused = true)]
    async fn records_span_and_metrics() {
        let (observer, telemetry) = observer();
        let request = InboundRequest::get("/users/7", "/users/{id}");

        let status = observer
            .observe(&request, |_span| async {
                assert!(current_span().is_some());
                tokio::time::sleep(Duration::from_millis(120)).await;
                200_u16
            })
            .await;
        assert_eq!(status, 200);

        let spans = telemetry.finished_spans();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.name, "GET /users/{id}");
        assert_eq!(span.span_kind, SpanKind::Server);
        assert_eq!(span_attribute(span, ATTR_URL_PATH), Some(Value::from("/users/7")));
        assert_eq!(span_attribute(span, ATTR_HTTP_STATUS), Some(Value::I64(200)));
        assert_eq!(span.status, Status::Unset);

        let collected = telemetry.collect();
        let errors = collected.metric(ERROR_RATE).unwrap().data.as_sum().unwrap();
        let ok = find_point(
            errors,
            &[("state", Value::from("success")), (ATTR_ROUTE, Value::from("/users/{id}"))],
        )
        .unwrap();
        assert!((ok.value - 1.0).abs() < f64::EPSILON);

        let durations = collected.metric(REQUEST_DURATION).unwrap().data.as_histogram().unwrap();
        assert_eq!(durations[0].count, 1);
        assert!(durations[0].sum >= 0.12);
    }

    #[tokio::test]
    async fn continues_remote_trace() {
        let (observer, telemetry) = observer();
        let mut headers = Carrier::new();
        headers.insert(
            TRACEPARENT_HEADER.to_string(),
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01".to_string(),
        );
        let request = InboundRequest::get("/", "/").with_headers(headers);

        observer.observe(&request, |_| async { 200_u16 }).await;

        let span = &telemetry.finished_spans()[0];
        assert_eq!(
            span.span_context.trace_id().to_string(),
            "4bf92f3577b34da6a3ce929d0e0e4736"
        );
        assert_eq!(span.parent_span_id.to_string(), "00f067aa0ba902b7");
    }

    #[tokio::test]
    async fn malformed_parent_starts_root() {
        let (observer, telemetry) = observer();
        let mut headers = Carrier::new();
        headers.insert(TRACEPARENT_HEADER.to_string(), "not-a-traceparent".to_string());
        let request = InboundRequest::get("/", "/").with_headers(headers);

        let status = observer.observe(&request, |_| async { 200_u16 }).await;

        assert_eq!(status, 200);
        assert_eq!(telemetry.finished_spans()[0].parent_span_id, SpanId::INVALID);
    }

    #[tokio::test]
    async fn dependency_error_marks_span_and_fails_metric() {
        let (observer, telemetry) = observer();
        let request = InboundRequest::get("/users/1", "/users/{id}");

        let result: Result<u16, ApplicationError> = observer
            .observe(&request, |_| async {
                Err(ApplicationError::Dependency("down".to_string()))
            })
            .await;
        assert_eq!(result.status(), 503);

        let span = &telemetry.finished_spans()[0];
        assert!(matches!(span.status, Status::Error { .. }));
        assert_eq!(span_attribute(span, ATTR_HTTP_STATUS), Some(Value::I64(503)));

        let collected = telemetry.collect();
        let errors = collected.metric(ERROR_RATE).unwrap().data.as_sum().unwrap();
        assert!(find_point(errors, &[("state", Value::from("fail"))]).is_some());
    }

    #[test]
    fn user_response_status() {
        let response = UserResponse {
            status: 404,
            body: None,
        };
        assert_eq!(response.status(), 404);
        let ok: Result<UserResponse, ApplicationError> = Ok(response);
        assert_eq!(ok.status(), 404);
    }
}
