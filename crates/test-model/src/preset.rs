use loupe_model::{ResponseChunk, ToolCallDelta};
use serde::{Deserialize, Serialize};

/// The chunks in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetChunk {
    #[serde(rename = "reasoning")]
    Reasoning(String),
    #[serde(rename = "content")]
    Content(String),
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallDelta),
    /// A chunk without any choice.
    #[serde(rename = "empty")]
    Empty,
    /// The stream fails with the given message at this point.
    #[serde(rename = "fail")]
    Fail(String),
}

impl PresetChunk {
    /// Converts the preset into the chunk it stands for, or `None` for
    /// [`PresetChunk::Fail`].
    pub fn to_chunk(&self) -> Option<ResponseChunk> {
        Some(match self {
            PresetChunk::Reasoning(text) => ResponseChunk::reasoning(text),
            PresetChunk::Content(text) => ResponseChunk::content(text),
            PresetChunk::ToolCall(delta) => {
                ResponseChunk::tool_calls([delta.clone()])
            }
            PresetChunk::Empty => ResponseChunk::default(),
            PresetChunk::Fail(_) => return None,
        })
    }
}

/// The preset response for one request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Chunks in this response.
    pub chunks: Vec<PresetChunk>,
    /// If set, the request itself fails with this message.
    pub rejection: Option<String>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified chunks.
    #[inline]
    pub fn with_chunks(chunks: impl Into<Vec<PresetChunk>>) -> Self {
        Self {
            chunks: chunks.into(),
            rejection: None,
        }
    }

    /// Creates a response whose request fails before streaming.
    #[inline]
    pub fn rejected<S: Into<String>>(message: S) -> Self {
        Self {
            chunks: vec![],
            rejection: Some(message.into()),
        }
    }
}
