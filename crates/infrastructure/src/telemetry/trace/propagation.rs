//! W3C trace-context propagation over a string map carrier.

use std::collections::HashMap;

use opentelemetry::Context;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{SpanContext, TraceContextExt};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tracing::warn;

use super::span::Span;
use super::tracer::current_span;
use crate::telemetry::error::PropagationError;

/// Header carrying the parent trace and span ids
pub const TRACEPARENT_HEADER: &str = "traceparent";
/// Header carrying vendor-specific trace state
pub const TRACESTATE_HEADER: &str = "tracestate";

/// Flat header map used as the propagation carrier
pub type Carrier = HashMap<String, String>;

/// Injects and extracts W3C `traceparent` / `tracestate` headers
#[derive(Debug, Default, Clone)]
pub struct HeaderPropagator {
    inner: TraceContextPropagator,
}

impl HeaderPropagator {
    /// Create a propagator
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a span context into the carrier; invalid contexts are skipped
    pub fn inject_context(&self, context: &SpanContext, carrier: &mut Carrier) {
        let cx = Context::new().with_remote_span_context(context.clone());
        self.inner.inject_context(&cx, carrier);
    }

    /// Write a span's context into the carrier
    pub fn inject(&self, span: &Span, carrier: &mut Carrier) {
        self.inject_context(span.span_context(), carrier);
    }

    /// Write the active span's context; `false` when no span is active
    pub fn inject_current(&self, carrier: &mut Carrier) -> bool {
        match current_span() {
            Some(span) => {
                self.inject(&span, carrier);
                true
            },
            None => false,
        }
    }

    /// Parse a remote parent context from the carrier
    ///
    /// Header names match case-insensitively.
    pub fn extract(&self, carrier: &Carrier) -> Result<SpanContext, PropagationError> {
        let headers: Carrier = carrier
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect();
        let traceparent = headers
            .get(TRACEPARENT_HEADER)
            .ok_or(PropagationError::Missing)?;

        let cx = self.inner.extract_with_context(&Context::new(), &headers);
        let context = cx.span().span_context().clone();
        if context.is_valid() {
            Ok(context)
        } else {
            Err(PropagationError::Malformed(traceparent.clone()))
        }
    }

    /// Like [`extract`](Self::extract), but degrades to `None`
    ///
    /// A malformed header is logged; a missing header is not.
    pub fn extract_or_root(&self, carrier: &Carrier) -> Option<SpanContext> {
        match self.extract(carrier) {
            Ok(context) => Some(context),
            Err(PropagationError::Missing) => None,
            Err(e) => {
                warn!(error = %e, "Invalid trace context, starting a new trace");
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::trace::{SpanId, TraceFlags, TraceId, TraceState};

    use super::*;

    const VALID: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    fn carrier(pairs: &[(&str, &str)]) -> Carrier {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn extract_valid() {
        let cx = HeaderPropagator::new()
            .extract(&carrier(&[(TRACEPARENT_HEADER, VALID)]))
            .unwrap();
        assert_eq!(cx.trace_id().to_string(), "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(cx.span_id().to_string(), "00f067aa0ba902b7");
        assert!(cx.is_sampled());
        assert!(cx.is_remote());
    }

    #[test]
    fn inject_then_extract_roundtrip() {
        let propagator = HeaderPropagator::new();
        let original = SpanContext::new(
            TraceId::from_bytes(0x1234_u128.to_be_bytes()),
            SpanId::from_bytes(0x5678_u64.to_be_bytes()),
            TraceFlags::SAMPLED,
            false,
            TraceState::from_key_value([("vendor", "value")]).unwrap(),
        );

        let mut headers = Carrier::new();
        propagator.inject_context(&original, &mut headers);
        assert_eq!(headers[TRACESTATE_HEADER], "vendor=value");

        let extracted = propagator.extract(&headers).unwrap();
        assert_eq!(extracted.trace_id(), original.trace_id());
        assert_eq!(extracted.span_id(), original.span_id());
        assert_eq!(extracted.trace_state().get("vendor"), Some("value"));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let cx = HeaderPropagator::new()
            .extract(&carrier(&[("TraceParent", VALID)]))
            .unwrap();
        assert!(cx.is_valid());
    }

    #[test]
    fn missing_header() {
        let propagator = HeaderPropagator::new();
        assert_eq!(
            propagator.extract(&Carrier::new()).unwrap_err(),
            PropagationError::Missing
        );
        assert!(propagator.extract_or_root(&Carrier::new()).is_none());
    }

    #[test]
    fn malformed_headers_are_rejected() {
        let propagator = HeaderPropagator::new();
        for bad in [
            "garbage",
            "ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-extra",
            "00-4BF92F3577B34DA6A3CE929D0E0E4736-00f067aa0ba902b7-01",
            "00-00000000000000000000000000000000-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-0000000000000000-01",
        ] {
            let headers = carrier(&[(TRACEPARENT_HEADER, bad)]);
            assert_eq!(
                propagator.extract(&headers),
                Err(PropagationError::Malformed(bad.to_string())),
                "accepted {bad}"
            );
            assert!(propagator.extract_or_root(&headers).is_none());
        }
    }

    #[test]
    fn invalid_tracestate_is_ignored() {
        let headers = carrier(&[(TRACEPARENT_HEADER, VALID), (TRACESTATE_HEADER, "=,=")]);
        let cx = HeaderPropagator::new().extract(&headers).unwrap();
        assert!(cx.trace_state().header().is_empty());
    }

    #[test]
    fn invalid_context_is_not_injected() {
        let mut headers = Carrier::new();
        HeaderPropagator::new().inject_context(&SpanContext::empty_context(), &mut headers);
        assert!(headers.is_empty());
    }

    #[test]
    fn unsampled_flag_roundtrips() {
        let propagator = HeaderPropagator::new();
        let headers = carrier(&[(
            TRACEPARENT_HEADER,
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00",
        )]);
        let cx = propagator.extract(&headers).unwrap();
        assert!(!cx.is_sampled());

        let mut out = Carrier::new();
        propagator.inject_context(&cx, &mut out);
        assert!(out[TRACEPARENT_HEADER].ends_with("-00"));
    }
}
