use std::fmt::{self, Display};
use std::io;

/// Describes a failed tool call.
///
/// The message of a [`Error::Tool`] is shown to the model as is, so it
/// should tell the model what to do differently.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    /// An expected, recoverable failure, such as a missing file.
    Tool(String),
    /// Anything else, named by its kind.
    Unexpected {
        /// The kind of failure, e.g. `NotFound`.
        name: String,
        /// What happened.
        message: String,
    },
}

impl Error {
    /// Creates an actionable tool error.
    #[inline]
    pub fn tool<S: Into<String>>(message: S) -> Self {
        Self::Tool(message.into())
    }

    /// Creates an unexpected error of the given kind.
    #[inline]
    pub fn unexpected<S1: Into<String>, S2: Into<String>>(
        name: S1,
        message: S2,
    ) -> Self {
        Self::Unexpected {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns the tag recorded on the tool span.
    pub fn tag(&self) -> &str {
        match self {
            Error::Tool(_) => "tool_error",
            Error::Unexpected { name, .. } => name,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Tool(message) => f.write_str(message),
            Error::Unexpected { name, message } => write!(f, "{name}: {message}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::unexpected(format!("{:?}", err.kind()), err.to_string())
    }
}
