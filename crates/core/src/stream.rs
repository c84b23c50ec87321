//! Turns a streamed response into a finished result.

use std::fmt::Display;
use std::pin::pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use loupe_model::{ChunkDelta, ResponseChunk, ToolCall, ToolCallDelta};

use crate::conversation::MessageRepository;
use crate::output::{LoadingIndicator, OutputHandler};

/// The outcome of one streamed response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamResult {
    /// The full answer text.
    pub content: String,
    /// Tool calls in the order their indices first appeared.
    pub tool_calls: Vec<ToolCall>,
    /// Whether `content` is non-empty.
    pub has_content: bool,
    /// The number of chunks received.
    pub chunk_count: usize,
}

impl StreamResult {
    /// Returns whether the model asked for tool calls.
    #[inline]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Default)]
struct ToolCallBuilder {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallBuilder {
    fn build(self) -> ToolCall {
        ToolCall {
            id: self.id,
            name: self.name,
            arguments: self.arguments,
        }
    }
}

#[derive(Default)]
struct State {
    seen_reasoning: bool,
    seen_content: bool,
    content: String,
    // Keyed by index, in first-seen order.
    tool_calls: Vec<(u32, ToolCallBuilder)>,
    chunk_count: usize,
}

/// Consumes response chunks, rendering them as they arrive.
///
/// The processor keeps no state between responses.
#[derive(Clone)]
pub struct StreamResponseProcessor {
    output: Arc<dyn OutputHandler>,
    indicator: Arc<dyn LoadingIndicator>,
}

impl StreamResponseProcessor {
    /// Creates a processor rendering to `output`.
    #[inline]
    pub fn new(
        output: Arc<dyn OutputHandler>,
        indicator: Arc<dyn LoadingIndicator>,
    ) -> Self {
        Self { output, indicator }
    }

    /// Consumes `stream` to the end.
    ///
    /// Each chunk is fully handled before the next one is polled. The
    /// answer text, if any, is appended to `history` as one assistant
    /// message. When the stream fails, the error is reported and returned
    /// as is, and `history` is left untouched.
    pub async fn process<S, E>(
        &self,
        stream: S,
        history: &mut MessageRepository,
    ) -> Result<StreamResult, E>
    where
        S: Stream<Item = Result<ResponseChunk, E>>,
        E: Display,
    {
        let mut stream = pin!(stream);
        let mut state = State::default();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    self.indicator.stop();
                    self.output
                        .display_error(&format!("Error processing response: {err}"));
                    return Err(err);
                }
            };
            state.chunk_count += 1;
            trace!("got a chunk: {chunk:?}");
            if let Some(delta) = chunk.delta {
                self.handle_delta(delta, &mut state);
            }
        }

        Ok(self.finalize(state, history))
    }

    fn handle_delta(&self, delta: ChunkDelta, state: &mut State) {
        let ChunkDelta {
            reasoning,
            content,
            tool_calls,
        } = delta;

        if let Some(reasoning) = reasoning.filter(|s| !s.is_empty()) {
            self.handle_reasoning(&reasoning, state);
        }
        if let Some(content) = content.filter(|s| !s.is_empty()) {
            self.handle_content(&content, state);
        }
        for delta in tool_calls {
            self.handle_tool_call(delta, state);
        }
    }

    fn handle_reasoning(&self, reasoning: &str, state: &mut State) {
        let is_first = !state.seen_reasoning;
        if is_first {
            self.indicator.stop();
            state.seen_reasoning = true;
        }
        self.output.display_reasoning(reasoning, is_first);
    }

    fn handle_content(&self, content: &str, state: &mut State) {
        let is_first = !state.seen_content;
        if is_first {
            if !state.seen_reasoning {
                self.indicator.stop();
            }
            state.seen_content = true;
        }
        self.output
            .display_content(content, is_first, state.seen_reasoning);
        state.content.push_str(content);
    }

    fn handle_tool_call(&self, delta: ToolCallDelta, state: &mut State) {
        let position = match state
            .tool_calls
            .iter()
            .position(|(index, _)| *index == delta.index)
        {
            Some(position) => position,
            None => {
                self.indicator.stop();
                self.output.display_tool_call_start();
                state
                    .tool_calls
                    .push((delta.index, ToolCallBuilder::default()));
                state.tool_calls.len() - 1
            }
        };
        let builder = &mut state.tool_calls[position].1;

        if let Some(id) = delta.id.filter(|s| !s.is_empty()) {
            builder.id = id;
        }
        if let Some(name) = delta.name.filter(|s| !s.is_empty()) {
            builder.name = name;
            self.output.display_tool_call_name(&builder.name);
        }
        if let Some(arguments) = delta.arguments.filter(|s| !s.is_empty()) {
            builder.arguments.push_str(&arguments);
        }
    }

    fn finalize(
        &self,
        state: State,
        history: &mut MessageRepository,
    ) -> StreamResult {
        if !state.seen_content && state.tool_calls.is_empty() {
            self.indicator.stop();
        }
        self.output.newline();

        if !state.content.is_empty() {
            history.add_assistant_message(state.content.clone());
        }

        let tool_calls: Vec<_> = state
            .tool_calls
            .into_iter()
            .map(|(_, builder)| builder.build())
            .collect();
        for call in &tool_calls {
            self.output.display_tool_call(&call.name, &call.arguments);
        }

        StreamResult {
            has_content: !state.content.is_empty(),
            content: state.content,
            tool_calls,
            chunk_count: state.chunk_count,
        }
    }
}
