//! Conversation history.

use loupe_model::{Message, Role, ToolCall};
use thiserror::Error;

use crate::tool::ToolResult;

/// Errors raised when an update would break the history.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// A tool result answers a call that the nearest preceding assistant
    /// message never made.
    #[error("tool call `{0}` was not requested by the preceding assistant message")]
    UnknownToolCall(String),
}

/// The ordered message history of one conversation.
///
/// The first message is always the system prompt. Messages are never
/// modified once appended.
#[derive(Clone, Debug)]
pub struct MessageRepository {
    messages: Vec<Message>,
}

impl MessageRepository {
    /// Creates a history holding only the system prompt.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(system_prompt: S) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Appends a user message.
    pub fn add_user_message<S: Into<String>>(&mut self, content: S) {
        self.messages.push(Message::user(content));
    }

    /// Appends an assistant message with text content.
    pub fn add_assistant_message<S: Into<String>>(&mut self, content: S) {
        self.messages.push(Message::assistant(content));
    }

    /// Appends an assistant message recording the tool calls it made.
    pub fn add_assistant_tool_calls(&mut self, tool_calls: Vec<ToolCall>) {
        self.messages.push(Message::assistant_tool_calls(tool_calls));
    }

    /// Appends the result of a tool call.
    ///
    /// The call must belong to the nearest assistant message before the
    /// trailing run of tool messages.
    pub fn add_tool_result(
        &mut self,
        result: ToolResult,
    ) -> Result<(), HistoryError> {
        let requested = self
            .messages
            .iter()
            .rev()
            .find(|msg| msg.role != Role::Tool)
            .filter(|msg| msg.role == Role::Assistant)
            .is_some_and(|msg| {
                msg.tool_calls.iter().any(|call| call.id == result.tool_call_id)
            });
        if !requested {
            return Err(HistoryError::UnknownToolCall(result.tool_call_id));
        }

        self.messages.push(Message::tool(
            result.tool_call_id,
            result.name,
            result.content,
        ));
        Ok(())
    }

    /// Returns all messages in the order they are sent to the model.
    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the number of messages, including the system prompt.
    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always `false`, the system prompt is never removed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drops everything but the system prompt.
    pub fn clear(&mut self) {
        self.messages.truncate(1);
    }
}
