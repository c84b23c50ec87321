use loupe_model::{ErrorKind, ModelProviderError};
use loupe_trace::{SpanError, TraceError};
use thiserror::Error;

use crate::conversation::HistoryError;

/// Errors that abort a turn.
#[derive(Debug, Error)]
pub enum Error {
    /// The model request could not be sent.
    #[error("{0}")]
    Model(Box<dyn ModelProviderError>),
    /// The response stream failed while it was being consumed.
    ///
    /// The failure has already been shown to the user by the stream
    /// processor when this error is returned.
    #[error("{0}")]
    Stream(Box<dyn ModelProviderError>),
    /// A span could not be recorded.
    #[error(transparent)]
    Trace(#[from] TraceError),
    /// The message history rejected an update.
    #[error(transparent)]
    History(#[from] HistoryError),
    /// Span metadata could not be serialized.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

impl SpanError for Error {
    fn kind(&self) -> &str {
        match self {
            Error::Model(err) if err.kind() != ErrorKind::Other => {
                err.kind().as_str()
            }
            Error::Model(_) => "ModelError",
            Error::Stream(_) => "StreamError",
            Error::Trace(_) => "TraceError",
            Error::History(_) => "HistoryError",
            Error::Serialize(_) => "SerializeError",
        }
    }
}
