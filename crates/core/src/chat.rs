mod builder;
#[cfg(test)]
mod tests;

use std::pin::pin;
use std::sync::Arc;

use loupe_model::{ModelRequest, ToolCall};
use loupe_trace::{
    Broadcaster, SpanKind, Trace, TraceBuilder, TraceProcessor, TracingConfig,
    current_trace, span,
};
use tokio::select;

pub use builder::ChatBuilder;

use crate::conversation::MessageRepository;
use crate::error::Error;
use crate::model_client::ModelClient;
use crate::output::{LoadingIndicator, OutputHandler};
use crate::stream::StreamResponseProcessor;
use crate::tool::Executor as ToolExecutor;

const EXIT_COMMANDS: [&str; 3] = ["exit", "quit", "bye"];

/// A source of user input lines.
pub trait InputSource {
    /// Reads the next line, or `None` when the input is closed.
    fn next_line(&mut self) -> impl Future<Output = Option<String>> + Send;
}

/// A conversation between the user and the model.
///
/// Each user message starts a turn. A turn keeps requesting completions
/// over the whole history, running the tool calls the model asks for in
/// between, until a response comes back without tool calls.
pub struct Chat {
    model_client: ModelClient,
    history: MessageRepository,
    tool_executor: ToolExecutor,
    output: Arc<dyn OutputHandler>,
    indicator: Arc<dyn LoadingIndicator>,
    response_processor: StreamResponseProcessor,
    tracing: TracingConfig,
    broadcaster: Option<Broadcaster>,
    trace_processor: Option<Arc<dyn TraceProcessor>>,
}

impl Chat {
    /// Returns the message history.
    #[inline]
    pub fn history(&self) -> &MessageRepository {
        &self.history
    }

    /// Returns the identifier of the model.
    #[inline]
    pub fn model_id(&self) -> &str {
        self.model_client.model_id()
    }

    /// Runs the conversation until the user leaves or the input closes.
    #[inline]
    pub async fn run<I: InputSource>(
        &mut self,
        input: &mut I,
    ) -> Result<(), Error> {
        self.run_until(input, std::future::pending()).await
    }

    /// Runs the conversation until the user leaves, the input closes, or
    /// `interrupt` completes.
    ///
    /// The whole conversation is recorded as one trace. A turn cut short
    /// by `interrupt` leaves its spans marked as cancelled. Failed turns
    /// are reported and the conversation goes on, only tracing failures
    /// outside of turns are returned.
    pub async fn run_until<I, F>(
        &mut self,
        input: &mut I,
        interrupt: F,
    ) -> Result<(), Error>
    where
        I: InputSource,
        F: Future<Output = ()>,
    {
        self.output.display_welcome();

        let trace = self.start_trace()?;
        let result = trace
            .run(|_| self.conversation(input, interrupt))
            .await;
        let shutdown = trace.shutdown();
        result?;
        shutdown?;
        Ok(())
    }

    fn start_trace(&self) -> Result<Trace, Error> {
        let mut builder = TraceBuilder::with_name("conversation")
            .with_config(self.tracing.clone());
        if let Some(broadcaster) = &self.broadcaster {
            builder = builder.with_broadcaster(broadcaster.clone());
        }
        if let Some(processor) = &self.trace_processor {
            builder = builder.with_processor(processor.clone());
        }
        let trace = builder.build()?;
        debug!("started trace {}", trace.trace_id());
        Ok(trace)
    }

    async fn conversation<I, F>(
        &mut self,
        input: &mut I,
        interrupt: F,
    ) -> Result<(), Error>
    where
        I: InputSource,
        F: Future<Output = ()>,
    {
        let mut interrupt = pin!(interrupt);
        loop {
            let line = select! {
                biased;
                () = &mut interrupt => None,
                line = input.next_line() => line,
            };
            let Some(line) = line else {
                break;
            };

            let line = line.trim();
            if is_exit_command(line) {
                break;
            }
            if line.is_empty() {
                continue;
            }

            let result = select! {
                biased;
                () = &mut interrupt => None,
                result = self.send(line) => Some(result),
            };
            match result {
                None => {
                    self.indicator.stop();
                    break;
                }
                Some(Ok(())) => {}
                // Already reported while the response was streaming.
                Some(Err(Error::Stream(err))) => {
                    debug!("turn aborted: {err}");
                }
                Some(Err(err)) => {
                    debug!("turn failed: {err}");
                    self.output.display_error(&err.to_string());
                }
            }
        }
        self.output.display_goodbye();
        Ok(())
    }

    /// Sends a user message and completes the turn it starts.
    pub async fn send(&mut self, text: &str) -> Result<(), Error> {
        let turn = span("turn", SpanKind::Turn);
        turn.set("model", self.model_client.model_id());
        turn.run(|_| async move {
            self.history.add_user_message(text);
            self.complete_with_tools().await
        })
        .await
    }

    async fn complete_with_tools(&mut self) -> Result<(), Error> {
        loop {
            self.indicator.start();
            match self.request_completion().await {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(err) => {
                    self.indicator.stop();
                    return Err(err);
                }
            }
        }
    }

    /// Requests one completion, running its tool calls.
    ///
    /// Returns whether the model asked for tools, in which case another
    /// completion is needed.
    async fn request_completion(&mut self) -> Result<bool, Error> {
        let request = ModelRequest {
            messages: self.history.messages().to_vec(),
            tools: self.tool_executor.definitions(),
        };

        let llm = span("llm", SpanKind::Llm);
        llm.set("model", self.model_client.model_id());
        llm.set("message_count", request.messages.len());
        llm.set("tool_count", request.tools.len());
        if current_trace().is_some_and(|trace| trace.include_sensitive_data()) {
            llm.set("messages", serde_json::to_string(&request.messages)?);
        }

        llm.run(|llm| async move {
            let stream = self
                .model_client
                .send_request(request)
                .await
                .map_err(Error::Model)?;
            let result = self
                .response_processor
                .process(stream, &mut self.history)
                .await
                .map_err(Error::Stream)?;

            llm.set("has_content", result.has_content);
            llm.set("tool_call_count", result.tool_calls.len());
            llm.set("chunk_count", result.chunk_count);

            if !result.has_tool_calls() {
                return Ok(false);
            }
            self.execute_tool_calls(result.tool_calls).await?;
            Ok(true)
        })
        .await
    }

    async fn execute_tool_calls(
        &mut self,
        tool_calls: Vec<ToolCall>,
    ) -> Result<(), Error> {
        self.history.add_assistant_tool_calls(tool_calls.clone());
        for call in &tool_calls {
            let result = self.tool_executor.execute(call).await?;
            self.output
                .display_tool_result(&result.content, result.is_error);
            self.history.add_tool_result(result)?;
        }
        Ok(())
    }
}

fn is_exit_command(line: &str) -> bool {
    EXIT_COMMANDS
        .iter()
        .any(|command| line.eq_ignore_ascii_case(command))
}
