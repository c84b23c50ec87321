use std::fmt::{self, Display};

/// Classifies a failure reported by a model provider.
///
/// The chat loop doesn't retry on its own, the kind is only used to tell
/// failures apart in traces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The provider refused to produce the content.
    Moderated,
    /// Too many requests were sent in a short time.
    RateLimitExceeded,
    /// Transport, protocol and any other failures.
    Other,
}

impl ErrorKind {
    /// Returns the name of this kind, e.g. `RateLimitExceeded`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Moderated => "Moderated",
            ErrorKind::RateLimitExceeded => "RateLimitExceeded",
            ErrorKind::Other => "Other",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
