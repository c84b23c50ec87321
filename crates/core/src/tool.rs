//! Tool call supports.

mod error;
mod executor;
mod object;

use loupe_model::ToolCall;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

pub use error::Error;
pub use executor::Executor;

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless. The argument schema
/// advertised to the model, and used to validate the arguments it sends,
/// is generated from [`Tool::Input`].
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned + JsonSchema;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = Result<String, Error>> + Send + 'static;
}

/// The result of a tool call, as reported back to the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolResult {
    /// The id of the call this result answers.
    pub tool_call_id: String,
    /// The name of the called tool.
    pub name: String,
    /// The output, or a description of the failure.
    pub content: String,
    /// Whether the call failed.
    pub is_error: bool,
}

impl ToolResult {
    pub(crate) fn success(call: &ToolCall, content: String) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content,
            is_error: false,
        }
    }

    pub(crate) fn failure(call: &ToolCall, message: String) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content: message,
            is_error: true,
        }
    }
}
