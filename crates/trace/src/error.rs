use std::fmt::Display;

use thiserror::Error;

/// Errors raised while recording spans.
///
/// Sink failures are never swallowed, they surface from the span operation
/// that triggered the write.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Writing to a file or socket failed.
    #[error("trace I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The span store rejected an operation.
    #[error("trace store failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A record could not be encoded or decoded.
    #[error("failed to serialize span: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The span has been started before.
    #[error("span `{0}` is already started")]
    AlreadyStarted(String),
    /// The processor was shut down.
    #[error("trace processor is closed")]
    Closed,
}

/// A failure that can be recorded on a span.
///
/// [`Span::run`](crate::Span::run) records failures as `"<kind>: <message>"`.
pub trait SpanError: Display {
    /// Names the kind of failure, the short type name by default.
    fn kind(&self) -> &str {
        short_type_name::<Self>()
    }
}

impl SpanError for TraceError {}

pub(crate) fn short_type_name<E: ?Sized>() -> &'static str {
    let name = std::any::type_name::<E>();
    // Strip generic arguments before taking the last path segment.
    let name = name.split('<').next().unwrap_or(name);
    name.rsplit("::").next().unwrap_or(name)
}
