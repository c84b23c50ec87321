use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::broadcaster::Broadcaster;
use crate::config::TracingConfig;
use crate::context;
use crate::error::{SpanError, TraceError};
use crate::processor::{NullProcessor, TraceProcessor, create_processor};
use crate::span::{Span, new_id};
use crate::types::{SpanKind, SpanValue};

/// Trace id of spans created outside of any running trace.
pub const NO_TRACE_ID: &str = "no_trace";

/// Builder for [`Trace`].
pub struct TraceBuilder {
    name: String,
    trace_id: Option<String>,
    config: TracingConfig,
    broadcaster: Option<Broadcaster>,
    processor: Option<Arc<dyn TraceProcessor>>,
}

impl TraceBuilder {
    /// Creates a builder for a trace named `name`.
    #[inline]
    pub fn with_name<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            trace_id: None,
            config: TracingConfig::default(),
            broadcaster: None,
            processor: None,
        }
    }

    /// Sets the tracing configuration.
    #[inline]
    pub fn with_config(mut self, config: TracingConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the hub that live events are published to.
    #[inline]
    pub fn with_broadcaster(mut self, broadcaster: Broadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Uses `processor` instead of the one selected by the configuration.
    #[inline]
    pub fn with_processor(mut self, processor: Arc<dyn TraceProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Uses a fixed trace id instead of a generated one.
    #[inline]
    pub fn with_trace_id<S: Into<String>>(mut self, trace_id: S) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Builds the trace, opening its processor.
    pub fn build(self) -> Result<Trace, TraceError> {
        let processor = match self.processor {
            Some(processor) => processor,
            None => create_processor(&self.config, self.broadcaster)?,
        };
        let trace_id = self.trace_id.unwrap_or_else(|| new_id("tr_"));
        let root = Span::new(
            self.name.clone(),
            SpanKind::Conversation,
            trace_id.clone(),
            None,
            processor.clone(),
        );
        Ok(Trace {
            inner: Arc::new(TraceInner {
                trace_id,
                name: self.name,
                config: self.config,
                processor,
                root,
            }),
        })
    }
}

struct TraceInner {
    trace_id: String,
    name: String,
    config: TracingConfig,
    processor: Arc<dyn TraceProcessor>,
    root: Span,
}

/// The spans of one conversation, sharing a processor.
#[derive(Clone)]
pub struct Trace {
    inner: Arc<TraceInner>,
}

impl Trace {
    /// Returns the unique id of this trace.
    #[inline]
    pub fn trace_id(&self) -> &str {
        &self.inner.trace_id
    }

    /// Returns the name of this trace.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the tracing configuration.
    #[inline]
    pub fn config(&self) -> &TracingConfig {
        &self.inner.config
    }

    /// Returns `true` if payloads may be recorded in span metadata.
    #[inline]
    pub fn include_sensitive_data(&self) -> bool {
        self.inner.config.include_sensitive_data
    }

    /// Returns the processor of this trace.
    #[inline]
    pub fn processor(&self) -> &Arc<dyn TraceProcessor> {
        &self.inner.processor
    }

    /// Returns the root span, named after the trace.
    #[inline]
    pub fn root_span(&self) -> &Span {
        &self.inner.root
    }

    /// Sets metadata on the root span.
    #[inline]
    pub fn set<K: Into<String>, V: Into<SpanValue>>(&self, key: K, value: V) {
        self.inner.root.set(key, value);
    }

    /// Creates a span in this trace, child of the current span.
    ///
    /// The span is not started.
    pub fn span<S: Into<String>>(&self, name: S, kind: SpanKind) -> Span {
        let parent_id = context::current_span().map(|span| span.span_id().to_owned());
        Span::new(
            name.into(),
            kind,
            self.inner.trace_id.clone(),
            parent_id,
            self.inner.processor.clone(),
        )
    }

    /// Runs `f` with this trace as the current trace.
    ///
    /// The root span is started before `f` and finished after it, so all
    /// spans created by `f` descend from it. Failures of `f` are recorded on
    /// the root span.
    pub async fn run<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(Span) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<TraceError> + SpanError,
    {
        let root = self.inner.root.clone();
        context::scope(self.clone(), root.run(f)).await
    }

    /// Shuts the processor down.
    #[inline]
    pub fn shutdown(&self) -> Result<(), TraceError> {
        self.inner.processor.shutdown()
    }
}

impl Debug for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trace")
            .field("trace_id", &self.inner.trace_id)
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Creates a span in the current trace.
///
/// Outside of a running trace, the span records nothing and belongs to
/// [`NO_TRACE_ID`].
pub fn span<S: Into<String>>(name: S, kind: SpanKind) -> Span {
    match context::current_trace() {
        Some(trace) => trace.span(name, kind),
        None => Span::new(
            name.into(),
            kind,
            NO_TRACE_ID.to_owned(),
            None,
            Arc::new(NullProcessor),
        ),
    }
}
