//! Tracer and task-local active span.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use opentelemetry::Context;
use opentelemetry::trace::{SpanContext, SpanKind, TraceContextExt, Tracer as _};
use opentelemetry_sdk::trace::SdkTracer;
use tracing::warn;

use super::span::Span;

tokio::task_local! {
    static ACTIVE_SPAN: Span;
}

/// The span active in the current task, if any
pub fn current_span() -> Option<Span> {
    ACTIVE_SPAN.try_with(Clone::clone).ok()
}

/// Run a future with `span` as the active span
///
/// The previously active span is restored when the future completes.
pub async fn with_active_span<F: Future>(span: Span, future: F) -> F::Output {
    ACTIVE_SPAN.scope(span, future).await
}

/// Creates spans on an SDK tracer
#[derive(Clone)]
pub struct Tracer {
    inner: SdkTracer,
    finished: Arc<AtomicU64>,
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("finished_spans", &self.finished_spans())
            .finish_non_exhaustive()
    }
}

impl Tracer {
    /// Wrap an SDK tracer
    pub fn new(inner: SdkTracer) -> Self {
        Self {
            inner,
            finished: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Sampled spans ended so far, whether or not they were exported
    pub fn finished_spans(&self) -> u64 {
        self.finished.load(Ordering::Acquire)
    }

    /// Start a span under the task's active span, or a root if none
    pub fn start_span(&self, name: impl Into<String>, kind: SpanKind) -> Span {
        match current_span() {
            Some(parent) => self.start_child(&parent, name, kind),
            None => self.start_root(name, kind),
        }
    }

    /// Start a span in a new trace
    pub fn start_root(&self, name: impl Into<String>, kind: SpanKind) -> Span {
        self.build(name.into(), kind, &Context::new(), None)
    }

    /// Start a span under an explicit local parent
    ///
    /// If the parent already ended the span becomes a new root.
    pub fn start_child(&self, parent: &Span, name: impl Into<String>, kind: SpanKind) -> Span {
        let name = name.into();
        if !parent.register_child() {
            warn!(span = %name, parent = %parent.name(), "Parent span already ended, starting a new trace");
            return self.start_root(name, kind);
        }

        let cx = Context::new().with_remote_span_context(parent.span_context().clone());
        self.build(name, kind, &cx, Some(parent.clone()))
    }

    /// Start a span under an extracted remote context, or a root if `None`
    pub fn start_with_remote_parent(
        &self,
        name: impl Into<String>,
        remote: Option<&SpanContext>,
        kind: SpanKind,
    ) -> Span {
        match remote.filter(|cx| cx.is_valid()) {
            Some(remote) => {
                let cx = Context::new().with_remote_span_context(remote.clone());
                self.build(name.into(), kind, &cx, None)
            },
            None => self.start_root(name, kind),
        }
    }

    /// Run `f` inside a new span that is active for its duration, then end it
    pub async fn in_span<F, Fut, T>(&self, name: impl Into<String>, kind: SpanKind, f: F) -> T
    where
        F: FnOnce(Span) -> Fut,
        Fut: Future<Output = T>,
    {
        let span = self.start_span(name, kind);
        let output = with_active_span(span.clone(), f(span.clone())).await;
        if let Err(e) = span.end() {
            warn!(error = %e, "Failed to end span");
        }
        output
    }

    fn build(&self, name: String, kind: SpanKind, cx: &Context, parent: Option<Span>) -> Span {
        let parent_cx = cx.span().span_context().clone();
        let parent_span_id = parent_cx.is_valid().then(|| parent_cx.span_id());
        let start_time = SystemTime::now();

        let span = self
            .inner
            .span_builder(name.clone())
            .with_kind(kind.clone())
            .with_start_time(start_time)
            .start_with_context(&self.inner, cx);

        Span::start(
            name,
            kind,
            start_time,
            span,
            parent,
            parent_span_id,
            self.finished.clone(),
        )
    }
}
