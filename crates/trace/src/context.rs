use std::cell::RefCell;

use crate::span::Span;
use crate::trace::Trace;

/// The per-task tracing state, installed by [`Trace::run`].
#[derive(Default)]
pub(crate) struct TraceContext {
    pub trace: Option<Trace>,
    pub current_span: Option<Span>,
}

tokio::task_local! {
    static CONTEXT: RefCell<TraceContext>;
}

/// Runs `fut` with a fresh context where `trace` is current.
pub(crate) async fn scope<F: Future>(trace: Trace, fut: F) -> F::Output {
    let context = TraceContext {
        trace: Some(trace),
        current_span: None,
    };
    CONTEXT.scope(RefCell::new(context), fut).await
}

/// Replaces the current span, returning the previous one.
///
/// Returns `None` when called outside of any trace scope, in which case
/// nothing is installed.
pub(crate) fn replace_current_span(span: Option<Span>) -> Option<Option<Span>> {
    CONTEXT
        .try_with(|context| {
            std::mem::replace(&mut context.borrow_mut().current_span, span)
        })
        .ok()
}

/// Returns the trace running in the current task, if any.
pub fn current_trace() -> Option<Trace> {
    CONTEXT
        .try_with(|context| context.borrow().trace.clone())
        .ok()
        .flatten()
}

/// Returns the innermost started span of the current task, if any.
pub fn current_span() -> Option<Span> {
    CONTEXT
        .try_with(|context| context.borrow().current_span.clone())
        .ok()
        .flatten()
}
