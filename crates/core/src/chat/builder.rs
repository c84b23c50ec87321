use std::sync::Arc;

use loupe_model::ModelProvider;
use loupe_trace::{Broadcaster, TraceProcessor, TracingConfig};

use super::Chat;
use crate::conversation::MessageRepository;
use crate::model_client::ModelClient;
use crate::output::{LoadingIndicator, OutputHandler, Silent};
use crate::stream::StreamResponseProcessor;
use crate::tool::{Executor as ToolExecutor, Tool};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// [`Chat`] builder.
pub struct ChatBuilder {
    model_client: ModelClient,
    system_prompt: String,
    tool_executor: ToolExecutor,
    output: Arc<dyn OutputHandler>,
    indicator: Arc<dyn LoadingIndicator>,
    tracing: TracingConfig,
    broadcaster: Option<Broadcaster>,
    trace_processor: Option<Arc<dyn TraceProcessor>>,
}

impl ChatBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            tool_executor: ToolExecutor::default(),
            output: Arc::new(Silent),
            indicator: Arc::new(Silent),
            tracing: TracingConfig::default(),
            broadcaster: None,
            trace_processor: None,
        }
    }

    /// Sets the system prompt.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.tool_executor.register(tool);
        self
    }

    /// Renders the conversation with `output`.
    ///
    /// Nothing is shown by default.
    #[inline]
    pub fn with_output(mut self, output: Arc<dyn OutputHandler>) -> Self {
        self.output = output;
        self
    }

    /// Shows `indicator` while waiting for the model.
    #[inline]
    pub fn with_loading_indicator(
        mut self,
        indicator: Arc<dyn LoadingIndicator>,
    ) -> Self {
        self.indicator = indicator;
        self
    }

    /// Sets how the conversation is traced.
    #[inline]
    pub fn with_tracing(mut self, config: TracingConfig) -> Self {
        self.tracing = config;
        self
    }

    /// Publishes spans to `broadcaster` when live streaming is enabled.
    #[inline]
    pub fn with_broadcaster(mut self, broadcaster: Broadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Sends spans to `processor` instead of the one the tracing config
    /// asks for.
    #[inline]
    pub fn with_trace_processor(
        mut self,
        processor: Arc<dyn TraceProcessor>,
    ) -> Self {
        self.trace_processor = Some(processor);
        self
    }

    /// Builds the chat.
    pub fn build(self) -> Chat {
        let response_processor = StreamResponseProcessor::new(
            self.output.clone(),
            self.indicator.clone(),
        );
        Chat {
            model_client: self.model_client,
            history: MessageRepository::with_system_prompt(self.system_prompt),
            tool_executor: self.tool_executor,
            output: self.output,
            indicator: self.indicator,
            response_processor,
            tracing: self.tracing,
            broadcaster: self.broadcaster,
            trace_processor: self.trace_processor,
        }
    }
}
