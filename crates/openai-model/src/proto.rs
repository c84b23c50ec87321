use loupe_model::{
    ChunkDelta, Message as ModelMessage, ModelRequest, ModelTool,
    ResponseChunk, Role, ToolCall as ModelToolCall, ToolCallDelta,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct FunctionChunk {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ToolCallChunk {
    #[serde(default)]
    pub index: u32,
    pub id: Option<String>,
    pub function: Option<FunctionChunk>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub delta: Delta,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCallChunk>>,
    pub reasoning_content: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionTool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct ToolCall {
    id: String,
    r#type: &'static str,
    function: FunctionCall,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Message {
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    stream: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    let tools: Vec<_> = req.tools.iter().map(create_tool).collect();
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        tool_choice: (!tools.is_empty()).then_some("auto"),
        tools,
        stream: true,
    }
}

#[inline]
fn create_message(msg: &ModelMessage) -> Message {
    Message {
        role: msg.role,
        content: (!msg.content.is_empty()).then(|| msg.content.clone()),
        tool_calls: msg.tool_calls.iter().map(create_tool_call).collect(),
        tool_call_id: msg.tool_call_id.clone(),
        name: msg.name.clone(),
    }
}

#[inline]
fn create_tool_call(call: &ModelToolCall) -> ToolCall {
    ToolCall {
        id: call.id.clone(),
        r#type: "function",
        function: FunctionCall {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        },
    }
}

#[inline]
fn create_tool(tool: &ModelTool) -> Tool {
    Tool {
        r#type: "function",
        function: FunctionTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

impl ChatCompletionChunk {
    /// Converts the wire chunk into a model chunk, keeping the first choice.
    pub fn into_response_chunk(self) -> ResponseChunk {
        let Some(choice) = self.choices.into_iter().next() else {
            return ResponseChunk::default();
        };
        let Delta {
            content,
            tool_calls,
            reasoning_content,
        } = choice.delta;
        let tool_calls = tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                let (name, arguments) = match call.function {
                    Some(f) => (f.name, f.arguments),
                    None => (None, None),
                };
                ToolCallDelta {
                    index: call.index,
                    id: call.id,
                    name,
                    arguments,
                }
            })
            .collect();
        ResponseChunk::with_delta(ChunkDelta {
            reasoning: reasoning_content,
            content,
            tool_calls,
        })
    }
}
