//! Span lifecycle.
//!
//! A [`Span`] is a cheap handle over an SDK span; clones refer to the same
//! span. A child holds a handle to its parent, so a parent is always alive
//! while any child is. The span ends on an explicit [`Span::end`], or, if every
//! handle is dropped first, it is closed as cancelled.
//!
//! The SDK ends spans in any order. Here a parent refuses to end while a child
//! is open, and its end time is never earlier than the latest child's.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::SystemTime;

use opentelemetry::trace::{Span as _, SpanContext, SpanId, SpanKind, Status};
use opentelemetry::{Key, KeyValue, Value};
use opentelemetry_sdk::trace::Span as SdkSpan;
use parking_lot::Mutex;
use tracing::debug;

use crate::telemetry::error::TraceError;

/// Attribute set on spans closed by drop
pub const ATTR_ERROR: &str = "error";
/// Attribute naming the error category
pub const ATTR_ERROR_TYPE: &str = "error.type";

struct SpanState {
    /// `None` once the span has ended
    span: Option<SdkSpan>,
    latest_child_end: Option<SystemTime>,
}

struct SpanInner {
    name: String,
    context: SpanContext,
    kind: SpanKind,
    parent: Option<Span>,
    parent_span_id: Option<SpanId>,
    start_time: SystemTime,
    open_children: AtomicUsize,
    state: Mutex<SpanState>,
    finished: Arc<AtomicU64>,
}

fn end_time(start_time: SystemTime, latest_child_end: Option<SystemTime>) -> SystemTime {
    let now = SystemTime::now().max(start_time);
    latest_child_end.map_or(now, |child| now.max(child))
}

impl SpanInner {
    fn child_started(&self) -> bool {
        let state = self.state.lock();
        if state.span.is_none() {
            return false;
        }
        self.open_children.fetch_add(1, Ordering::AcqRel);
        true
    }

    fn child_ended(&self, end_time: SystemTime) {
        let mut state = self.state.lock();
        state.latest_child_end = Some(state.latest_child_end.map_or(end_time, |t| t.max(end_time)));
        self.open_children.fetch_sub(1, Ordering::AcqRel);
    }

    fn finish(&self, mut span: SdkSpan, end_time: SystemTime) {
        if self.context.is_sampled() {
            self.finished.fetch_add(1, Ordering::AcqRel);
        }
        span.end_with_timestamp(end_time);
        if let Some(parent) = &self.parent {
            parent.inner.child_ended(end_time);
        }
    }
}

impl Drop for SpanInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        let Some(mut span) = state.span.take() else {
            return;
        };

        debug!(span = %self.name, "Span dropped before end, closing as cancelled");
        span.set_attribute(KeyValue::new(ATTR_ERROR, true));
        span.set_attribute(KeyValue::new(ATTR_ERROR_TYPE, "cancelled"));
        span.set_status(Status::error("cancelled"));

        let end_time = end_time(self.start_time, state.latest_child_end);
        self.finish(span, end_time);
    }
}

/// Handle to an open or finished span
#[derive(Clone)]
pub struct Span {
    inner: Arc<SpanInner>,
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("name", &self.inner.name)
            .field("span_id", &self.inner.context.span_id())
            .field("ended", &self.is_ended())
            .finish_non_exhaustive()
    }
}

impl Span {
    pub(crate) fn start(
        name: String,
        kind: SpanKind,
        start_time: SystemTime,
        span: SdkSpan,
        parent: Option<Self>,
        parent_span_id: Option<SpanId>,
        finished: Arc<AtomicU64>,
    ) -> Self {
        Self {
            inner: Arc::new(SpanInner {
                name,
                context: span.span_context().clone(),
                kind,
                parent,
                parent_span_id,
                start_time,
                open_children: AtomicUsize::new(0),
                state: Mutex::new(SpanState {
                    span: Some(span),
                    latest_child_end: None,
                }),
                finished,
            }),
        }
    }

    /// Register a new child; `false` if this span already ended
    pub(crate) fn register_child(&self) -> bool {
        self.inner.child_started()
    }

    /// Operation name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Trace context of this span
    pub fn span_context(&self) -> &SpanContext {
        &self.inner.context
    }

    /// Span role
    pub fn kind(&self) -> &SpanKind {
        &self.inner.kind
    }

    /// Parent span id, local or remote
    pub fn parent_span_id(&self) -> Option<SpanId> {
        self.inner.parent_span_id
    }

    /// Number of children started and not yet ended
    pub fn open_children(&self) -> usize {
        self.inner.open_children.load(Ordering::Acquire)
    }

    /// Whether the span has ended
    pub fn is_ended(&self) -> bool {
        self.inner.state.lock().span.is_none()
    }

    /// Set an attribute; ignored after the span ended
    pub fn set_attribute(&self, key: impl Into<Key>, value: impl Into<Value>) {
        if let Some(span) = self.inner.state.lock().span.as_mut() {
            span.set_attribute(KeyValue::new(key, value));
        }
    }

    /// Set several attributes
    pub fn set_attributes(&self, attributes: impl IntoIterator<Item = KeyValue>) {
        if let Some(span) = self.inner.state.lock().span.as_mut() {
            span.set_attributes(attributes);
        }
    }

    /// Set the final status; ignored after the span ended
    pub fn set_status(&self, status: Status) {
        if let Some(span) = self.inner.state.lock().span.as_mut() {
            span.set_status(status);
        }
    }

    /// Close the span and hand it to the span processor
    ///
    /// Fails without closing if the span already ended or still has open
    /// children.
    pub fn end(&self) -> Result<(), TraceError> {
        let (span, end_time) = {
            let mut state = self.inner.state.lock();
            if state.span.is_none() {
                return Err(TraceError::AlreadyEnded(self.inner.name.clone()));
            }
            let open = self.inner.open_children.load(Ordering::Acquire);
            if open > 0 {
                return Err(TraceError::OpenChildren {
                    name: self.inner.name.clone(),
                    open,
                });
            }

            let end_time = end_time(self.inner.start_time, state.latest_child_end);
            let span = state
                .span
                .take()
                .ok_or_else(|| TraceError::AlreadyEnded(self.inner.name.clone()))?;
            (span, end_time)
        };

        self.inner.finish(span, end_time);
        Ok(())
    }
}
