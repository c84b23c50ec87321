use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};

use crate::provider::ModelProviderError;

/// A streamed response from the model provider.
pub trait ModelResponse: Sized + Send + 'static {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// Attempts to pull out the next fragment from the response.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct response state:
    ///
    /// - `Poll::Pending` means that this response is still waiting for
    ///   the next fragment. Implementations will ensure that the current
    ///   task will be notified when the next fragment may be ready.
    /// - `Poll::Ready(Ok(Some(chunk)))` means the response has a fragment
    ///   to deliver, and may produce further fragments on subsequent
    ///   `poll_next_chunk` calls.
    /// - `Poll::Ready(Ok(None))` means the response has completed.
    /// - `Poll::Ready(Err(error))` means an error occurred while
    ///   receiving the response.
    ///
    /// Calling this method after completion should always return `None`.
    /// Dropping the response releases the underlying transport.
    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ResponseChunk>, Self::Error>>;
}

/// One incremental piece of a streamed response.
///
/// A chunk carries at most one choice. Chunks without a choice (usage
/// reports, keepalives) have no delta.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResponseChunk {
    /// The delta of the only choice, if any.
    pub delta: Option<ChunkDelta>,
}

impl ResponseChunk {
    /// Creates a chunk carrying a content delta.
    #[inline]
    pub fn content<S: Into<String>>(content: S) -> Self {
        Self::with_delta(ChunkDelta {
            content: Some(content.into()),
            ..Default::default()
        })
    }

    /// Creates a chunk carrying a reasoning delta.
    #[inline]
    pub fn reasoning<S: Into<String>>(reasoning: S) -> Self {
        Self::with_delta(ChunkDelta {
            reasoning: Some(reasoning.into()),
            ..Default::default()
        })
    }

    /// Creates a chunk carrying tool call deltas.
    #[inline]
    pub fn tool_calls(tool_calls: impl Into<Vec<ToolCallDelta>>) -> Self {
        Self::with_delta(ChunkDelta {
            tool_calls: tool_calls.into(),
            ..Default::default()
        })
    }

    /// Creates a chunk with the given delta.
    #[inline]
    pub fn with_delta(delta: ChunkDelta) -> Self {
        Self { delta: Some(delta) }
    }
}

/// The partial data of a choice.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Reasoning text, for models that expose their thinking.
    pub reasoning: Option<String>,
    /// Answer text.
    pub content: Option<String>,
    /// Partial tool calls, each tagged with its positional index.
    #[serde(default)]
    pub tool_calls: Vec<ToolCallDelta>,
}

/// A fragment of a tool call.
///
/// Fragments for the same call share an `index`. The id and name usually
/// arrive in the first fragment, while `arguments` is split across many.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// The position of the call in the response.
    pub index: u32,
    /// The call identifier.
    pub id: Option<String>,
    /// The function name.
    pub name: Option<String>,
    /// A piece of the serialized arguments.
    pub arguments: Option<String>,
}

impl ToolCallDelta {
    /// Creates a fragment that opens a call.
    #[inline]
    pub fn start<S1: Into<String>, S2: Into<String>>(
        index: u32,
        id: S1,
        name: S2,
    ) -> Self {
        Self {
            index,
            id: Some(id.into()),
            name: Some(name.into()),
            arguments: None,
        }
    }

    /// Creates a fragment carrying only a piece of arguments.
    #[inline]
    pub fn arguments<S: Into<String>>(index: u32, arguments: S) -> Self {
        Self {
            index,
            arguments: Some(arguments.into()),
            ..Default::default()
        }
    }
}
