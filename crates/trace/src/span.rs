use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::context;
use crate::error::{SpanError, TraceError};
use crate::processor::TraceProcessor;
use crate::types::{SpanData, SpanKind, SpanStatus, SpanValue};

/// Generates an id made of `prefix` and 12 random hex digits.
pub(crate) fn new_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{prefix}{}", &hex[..12])
}

#[derive(Default)]
struct SpanState {
    data: SpanData,
    status: SpanStatus,
    error: Option<String>,
    started_at: Option<Instant>,
    ended_at: Option<Instant>,
    // The span that was current before this one started. The outer `None`
    // means the span was started outside of any trace scope.
    previous: Option<Option<Span>>,
}

struct SpanInner {
    span_id: String,
    trace_id: String,
    parent_id: Option<String>,
    name: String,
    kind: SpanKind,
    processor: Arc<dyn TraceProcessor>,
    state: Mutex<SpanState>,
}

/// A timed, named unit of work.
///
/// `Span` is a cheap handle, clones refer to the same span. Metadata and
/// status may be changed by any holder until the span finishes, later
/// changes are ignored.
#[derive(Clone)]
pub struct Span {
    inner: Arc<SpanInner>,
}

impl Span {
    pub(crate) fn new(
        name: String,
        kind: SpanKind,
        trace_id: String,
        parent_id: Option<String>,
        processor: Arc<dyn TraceProcessor>,
    ) -> Self {
        Self {
            inner: Arc::new(SpanInner {
                span_id: new_id("sp_"),
                trace_id,
                parent_id,
                name,
                kind,
                processor,
                state: Default::default(),
            }),
        }
    }

    /// Returns the unique id of this span.
    #[inline]
    pub fn span_id(&self) -> &str {
        &self.inner.span_id
    }

    /// Returns the id of the trace this span belongs to.
    #[inline]
    pub fn trace_id(&self) -> &str {
        &self.inner.trace_id
    }

    /// Returns the id of the enclosing span.
    #[inline]
    pub fn parent_id(&self) -> Option<&str> {
        self.inner.parent_id.as_deref()
    }

    /// Returns the name of this span.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the kind of this span.
    #[inline]
    pub fn kind(&self) -> SpanKind {
        self.inner.kind
    }

    /// Returns a snapshot of the metadata.
    pub fn data(&self) -> SpanData {
        self.inner.state.lock().data.clone()
    }

    /// Returns the metadata value of `key`.
    pub fn get(&self, key: &str) -> Option<SpanValue> {
        self.inner.state.lock().data.get(key).cloned()
    }

    /// Returns the current status.
    pub fn status(&self) -> SpanStatus {
        self.inner.state.lock().status
    }

    /// Returns the recorded error message.
    pub fn error(&self) -> Option<String> {
        self.inner.state.lock().error.clone()
    }

    /// Returns the elapsed time in milliseconds, once finished.
    pub fn duration_ms(&self) -> Option<f64> {
        let state = self.inner.state.lock();
        let (started_at, ended_at) = (state.started_at?, state.ended_at?);
        Some(ended_at.duration_since(started_at).as_secs_f64() * 1000.0)
    }

    /// Returns `true` after [`Span::start`] succeeded and before finish.
    pub fn is_open(&self) -> bool {
        let state = self.inner.state.lock();
        state.started_at.is_some() && state.ended_at.is_none()
    }

    /// Sets a metadata field, overwriting any previous value.
    pub fn set<K: Into<String>, V: Into<SpanValue>>(&self, key: K, value: V) {
        let mut state = self.inner.state.lock();
        if state.ended_at.is_some() {
            debug!("ignoring metadata of finished span {}", self.span_id());
            return;
        }
        state.data.insert(key.into(), value.into());
    }

    /// Marks the span as failed. The span keeps running.
    pub fn set_error<S: Into<String>>(&self, message: S) {
        let mut state = self.inner.state.lock();
        if state.ended_at.is_some() {
            debug!("ignoring error set on finished span {}", self.span_id());
            return;
        }
        state.status = SpanStatus::Error;
        state.error = Some(message.into());
    }

    /// Starts the span and makes it the current span of the task.
    ///
    /// The returned guard finishes the span. Dropping the guard without
    /// calling [`SpanGuard::finish`] marks the span as cancelled (or panicked)
    /// before finishing it.
    pub fn start(&self) -> Result<SpanGuard, TraceError> {
        {
            let mut state = self.inner.state.lock();
            if state.started_at.is_some() {
                return Err(TraceError::AlreadyStarted(self.span_id().into()));
            }
            state.started_at = Some(Instant::now());
        }
        let previous = context::replace_current_span(Some(self.clone()));
        self.inner.state.lock().previous = previous;

        if let Err(err) = self.inner.processor.on_span_start(self) {
            self.restore_context();
            self.inner.state.lock().started_at = None;
            return Err(err);
        }
        Ok(SpanGuard {
            span: Some(self.clone()),
        })
    }

    /// Finishes the span, restoring the previously current span.
    ///
    /// Finishing is idempotent and finishing a span that never started does
    /// nothing.
    pub fn finish(&self) -> Result<(), TraceError> {
        {
            let mut state = self.inner.state.lock();
            if state.started_at.is_none() || state.ended_at.is_some() {
                return Ok(());
            }
            state.ended_at = Some(Instant::now());
        }
        self.restore_context();
        self.inner.processor.on_span_end(self)
    }

    fn restore_context(&self) {
        let previous = self.inner.state.lock().previous.take();
        if let Some(previous) = previous {
            context::replace_current_span(previous);
        }
    }

    /// Runs `f` inside this span.
    ///
    /// The span is started before `f` runs and finished on every exit path.
    /// If `f` fails, the error is recorded as `"<kind>: <message>"` unless
    /// the span already carries an error, then returned unchanged.
    pub async fn run<F, Fut, T, E>(self, f: F) -> Result<T, E>
    where
        F: FnOnce(Span) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<TraceError> + SpanError,
    {
        let guard = self.start()?;
        let result = f(self.clone()).await;
        if let Err(err) = &result {
            if self.status() != SpanStatus::Error {
                self.set_error(format!("{}: {err}", err.kind()));
            }
        }
        let finished = guard.finish();
        let value = result?;
        finished?;
        Ok(value)
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("span_id", &self.inner.span_id)
            .field("trace_id", &self.inner.trace_id)
            .field("parent_id", &self.inner.parent_id)
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .finish_non_exhaustive()
    }
}

/// Keeps a started span open until finished or dropped.
#[must_use = "dropping the guard finishes the span as cancelled"]
pub struct SpanGuard {
    span: Option<Span>,
}

impl SpanGuard {
    /// Returns the guarded span.
    pub fn span(&self) -> Option<&Span> {
        self.span.as_ref()
    }

    /// Finishes the span.
    pub fn finish(mut self) -> Result<(), TraceError> {
        match self.span.take() {
            Some(span) => span.finish(),
            None => Ok(()),
        }
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        let Some(span) = self.span.take() else {
            return;
        };
        if !span.is_open() {
            return;
        }
        let reason = if std::thread::panicking() {
            "panicked"
        } else {
            "cancelled"
        };
        span.set_error(reason);
        if let Err(err) = span.finish() {
            warn!("failed to finish span {}: {err}", span.span_id());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Display;

    use super::*;
    use crate::processor::NullProcessor;

    fn detached(name: &str) -> Span {
        Span::new(
            name.to_owned(),
            SpanKind::Internal,
            "tr_test".to_owned(),
            None,
            Arc::new(NullProcessor),
        )
    }

    #[test]
    fn test_ids() {
        let id = new_id("sp_");
        assert_eq!(id.len(), 15);
        assert!(id.starts_with("sp_"));
        assert!(id[3..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(detached("a").span_id(), detached("a").span_id());
    }

    #[test]
    fn test_duration_only_after_finish() {
        let span = detached("work");
        assert_eq!(span.duration_ms(), None);
        let guard = span.start().unwrap();
        assert_eq!(span.duration_ms(), None);
        assert!(span.is_open());
        guard.finish().unwrap();
        assert!(span.duration_ms().unwrap() >= 0.0);
        assert!(!span.is_open());

        // Finishing twice keeps the first end time.
        let duration = span.duration_ms();
        span.finish().unwrap();
        assert_eq!(span.duration_ms(), duration);
    }

    #[test]
    fn test_start_twice() {
        let span = detached("work");
        let _guard = span.start().unwrap();
        assert!(matches!(span.start(), Err(TraceError::AlreadyStarted(_))));
    }

    #[test]
    fn test_set_is_last_write_wins() {
        let span = detached("work");
        span.set("count", 1usize);
        span.set("count", 2usize);
        assert_eq!(span.get("count"), Some(SpanValue::Int(2)));
    }

    #[test]
    fn test_finished_span_is_frozen() {
        let span = detached("work");
        span.start().unwrap().finish().unwrap();
        span.set("late", true);
        span.set_error("late error");
        assert!(span.data().is_empty());
        assert_eq!(span.status(), SpanStatus::Ok);
        assert_eq!(span.error(), None);
    }

    #[test]
    fn test_set_error_keeps_running() {
        let span = detached("work");
        let guard = span.start().unwrap();
        span.set_error("boom");
        assert!(span.is_open());
        assert_eq!(span.status(), SpanStatus::Error);
        guard.finish().unwrap();
        assert_eq!(span.error().as_deref(), Some("boom"));
    }

    #[test]
    fn test_dropped_guard_marks_cancelled() {
        let span = detached("work");
        drop(span.start().unwrap());
        assert!(!span.is_open());
        assert_eq!(span.status(), SpanStatus::Error);
        assert_eq!(span.error().as_deref(), Some("cancelled"));
    }

    #[derive(Debug)]
    struct Boom;

    impl Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("went wrong")
        }
    }

    impl From<TraceError> for Boom {
        fn from(_: TraceError) -> Self {
            Boom
        }
    }

    impl SpanError for Boom {}

    #[derive(Debug)]
    struct Refused;

    impl Display for Refused {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("quota used up")
        }
    }

    impl From<TraceError> for Refused {
        fn from(_: TraceError) -> Self {
            Refused
        }
    }

    impl SpanError for Refused {
        fn kind(&self) -> &str {
            "RateLimited"
        }
    }

    #[tokio::test]
    async fn test_run_records_error() {
        let span = detached("work");
        let result: Result<(), Boom> =
            span.clone().run(|_| async { Err(Boom) }).await;
        assert!(result.is_err());
        assert!(!span.is_open());
        assert_eq!(span.error().as_deref(), Some("Boom: went wrong"));
    }

    #[tokio::test]
    async fn test_run_keeps_explicit_error() {
        let span = detached("work");
        let result: Result<(), Boom> = span
            .clone()
            .run(|span| async move {
                span.set_error("specific");
                Err(Boom)
            })
            .await;
        assert!(result.is_err());
        assert_eq!(span.error().as_deref(), Some("specific"));
    }

    #[tokio::test]
    async fn test_run_records_error_kind() {
        let span = detached("work");
        let result: Result<(), Refused> =
            span.clone().run(|_| async { Err(Refused) }).await;
        assert!(result.is_err());
        assert_eq!(span.error().as_deref(), Some("RateLimited: quota used up"));
    }

    #[test]
    fn test_short_type_name() {
        use crate::error::short_type_name;

        assert_eq!(short_type_name::<Boom>(), "Boom");
        assert_eq!(short_type_name::<std::io::Error>(), "Error");
        assert_eq!(short_type_name::<Vec<u8>>(), "Vec");
    }
}
