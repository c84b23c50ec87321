use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// What a span measures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    /// The whole conversation, the root of a trace.
    Conversation,
    /// One user message and everything it causes.
    Turn,
    /// A request to the model, including consuming its stream.
    Llm,
    /// One tool execution.
    Tool,
    /// Anything else.
    Internal,
}

impl SpanKind {
    /// Returns the stored name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanKind::Conversation => "conversation",
            SpanKind::Turn => "turn",
            SpanKind::Llm => "llm",
            SpanKind::Tool => "tool",
            SpanKind::Internal => "internal",
        }
    }
}

impl Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of a span.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    /// Nothing went wrong, so far.
    #[default]
    Ok,
    /// An error was recorded.
    Error,
}

/// A scalar metadata value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpanValue {
    /// No value.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    String(String),
}

/// Span metadata, last write wins per key.
pub type SpanData = BTreeMap<String, SpanValue>;

impl From<bool> for SpanValue {
    fn from(value: bool) -> Self {
        SpanValue::Bool(value)
    }
}

impl From<i64> for SpanValue {
    fn from(value: i64) -> Self {
        SpanValue::Int(value)
    }
}

impl From<usize> for SpanValue {
    fn from(value: usize) -> Self {
        SpanValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for SpanValue {
    fn from(value: f64) -> Self {
        SpanValue::Float(value)
    }
}

impl From<String> for SpanValue {
    fn from(value: String) -> Self {
        SpanValue::String(value)
    }
}

impl From<&str> for SpanValue {
    fn from(value: &str) -> Self {
        SpanValue::String(value.to_owned())
    }
}

impl<T: Into<SpanValue>> From<Option<T>> for SpanValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SpanValue::Null)
    }
}
