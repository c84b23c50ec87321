use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModelRequest {
    /// The full conversation history, in order.
    pub messages: Vec<Message>,
    /// Tools that are available to the model.
    pub tools: Vec<ModelTool>,
}

/// The author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The system instructions.
    System,
    /// The human on the other side.
    User,
    /// The model.
    Assistant,
    /// A tool call result.
    Tool,
}

/// A complete message in the conversation history.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// Who wrote the message.
    pub role: Role,
    /// Text content, possibly empty.
    pub content: String,
    /// Tool calls requested by the assistant in this message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For tool messages, the id of the call this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// For tool messages, the name of the tool that produced it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    #[inline]
    fn with_role<S: Into<String>>(role: Role, content: S) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: vec![],
            tool_call_id: None,
            name: None,
        }
    }

    /// Creates a system message.
    #[inline]
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Creates an assistant text message.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Creates an assistant message that records tool calls.
    #[inline]
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::with_role(Role::Assistant, "")
        }
    }

    /// Creates a tool result message.
    #[inline]
    pub fn tool<S1, S2, S3>(tool_call_id: S1, name: S2, content: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::with_role(Role::Tool, content)
        }
    }
}

/// A tool invocation requested by the model.
///
/// The arguments are kept exactly as the model produced them, they are
/// parsed only when the call is executed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCall {
    /// The opaque identifier assigned by the API.
    pub id: String,
    /// The name of the tool to call.
    pub name: String,
    /// The raw, serialized argument payload.
    pub arguments: String,
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// For most model providers, the parameters should typically be
    /// defined by a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_tool_message_shape() {
        let msg = Message::tool("call_1", "get_current_time", "12:00");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "role": "tool",
                "content": "12:00",
                "tool_call_id": "call_1",
                "name": "get_current_time",
            })
        );
    }

    #[test]
    fn test_assistant_tool_calls_has_empty_content() {
        let msg = Message::assistant_tool_calls(vec![ToolCall {
            id: "c1".to_owned(),
            name: "get_time".to_owned(),
            arguments: "{}".to_owned(),
        }]);
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.content.is_empty());
        assert_eq!(msg.tool_calls.len(), 1);
    }
}
