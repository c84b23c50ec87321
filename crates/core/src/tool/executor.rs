use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use futures_util::FutureExt;
use loupe_model::{ModelTool, ToolCall};
use loupe_trace::{SpanKind, TraceError, current_trace, span};
use serde_json::Value;

use super::object::{ToolObject, ToolObjectImpl};
use super::{Error, Tool, ToolResult};

struct Failure {
    tag: String,
    message: String,
}

impl Failure {
    fn new<S1: Into<String>, S2: Into<String>>(tag: S1, message: S2) -> Self {
        Self {
            tag: tag.into(),
            message: message.into(),
        }
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "tool panicked".to_owned());
        Self::from(Error::unexpected("Panic", message))
    }
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        match err {
            Error::Tool(message) => Self::new("tool_error", message),
            Error::Unexpected { name, message } => {
                let message = format!("Unexpected error: {name}: {message}");
                Self::new(name, message)
            }
        }
    }
}

/// Runs tool calls requested by the model.
///
/// Every failure is turned into an error result the model can read, the
/// executor itself only fails when the tool span can't be recorded.
#[derive(Default)]
pub struct Executor {
    // In registration order.
    tools: Vec<Box<dyn ToolObject>>,
}

impl Executor {
    /// Registers a tool, replacing any tool with the same name.
    pub fn register<T: Tool>(&mut self, tool: T) {
        let object: Box<dyn ToolObject> = Box::new(ToolObjectImpl::new(tool));
        match self.tools.iter().position(|t| t.name() == object.name()) {
            Some(position) => self.tools[position] = object,
            None => self.tools.push(object),
        }
    }

    /// Returns the definitions advertised to the model.
    #[inline]
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools
            .iter()
            .map(|tool| tool.definition().clone())
            .collect()
    }

    /// Returns the names of all registered tools.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|tool| tool.name())
    }

    /// Executes a tool call inside a `tool` span.
    pub async fn execute(
        &self,
        call: &ToolCall,
    ) -> Result<ToolResult, TraceError> {
        let sensitive =
            current_trace().is_some_and(|trace| trace.include_sensitive_data());

        let span = span("tool", SpanKind::Tool);
        span.set("tool_name", call.name.as_str());
        span.set("tool_call_id", call.id.as_str());
        if sensitive {
            span.set("arguments", call.arguments.as_str());
        }

        span.run(|span| async move {
            let result = match self.run(call).await {
                Ok(output) => {
                    span.set("is_error", false);
                    span.set("result_len", output.chars().count());
                    if sensitive {
                        span.set("result", output.as_str());
                    }
                    ToolResult::success(call, output)
                }
                Err(failure) => {
                    debug!("tool call {} failed: {}", call.id, failure.message);
                    span.set("is_error", true);
                    span.set("error_type", failure.tag);
                    ToolResult::failure(call, failure.message)
                }
            };
            Ok(result)
        })
        .await
    }

    async fn run(&self, call: &ToolCall) -> Result<String, Failure> {
        let Some(tool) = self.tools.iter().find(|t| t.name() == call.name)
        else {
            let available: Vec<_> = self.names().collect();
            return Err(Failure::new(
                "unknown_tool",
                format!(
                    "Unknown tool '{}'. Available: {}.",
                    call.name,
                    available.join(", ")
                ),
            ));
        };

        let arguments = if call.arguments.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&call.arguments).map_err(|err| {
                Failure::new(
                    "json_decode",
                    format!("Invalid JSON in arguments. {err}."),
                )
            })?
        };
        tool.validate(&arguments)
            .map_err(|message| Failure::new("validation", message))?;

        trace!("executing tool {} with {arguments}", call.name);
        let future = panic::catch_unwind(AssertUnwindSafe(|| {
            tool.execute(arguments)
        }))
        .map_err(Failure::from_panic)?
        .map_err(|message| Failure::new("validation", message))?;

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(err)) => Err(err.into()),
            Err(payload) => Err(Failure::from_panic(payload)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::ready;
    use std::sync::Arc;

    use loupe_trace::{SpanValue, TraceBuilder, TracingConfig};
    use schemars::JsonSchema;
    use serde::Deserialize;

    use super::*;
    use crate::testing::RecordingProcessor;

    #[derive(Deserialize, JsonSchema)]
    struct TimeInput {
        timezone: String,
    }

    struct TimeTool;

    impl Tool for TimeTool {
        type Input = TimeInput;

        fn name(&self) -> &str {
            "get_current_time"
        }

        fn description(&self) -> &str {
            "Returns the current time."
        }

        fn execute(
            &self,
            input: Self::Input,
        ) -> impl Future<Output = Result<String, Error>> + Send + 'static {
            ready(match input.timezone.as_str() {
                "UTC" => Ok("12:00".to_owned()),
                "Mars/Base" => {
                    Err(Error::unexpected("ZoneError", "no such planet"))
                }
                "Boom" => panic!("clock exploded"),
                zone => Err(Error::tool(format!(
                    "Unknown timezone '{zone}'. Use an IANA name."
                ))),
            })
        }
    }

    #[derive(Deserialize, JsonSchema)]
    struct NoInput {}

    struct PingTool;

    impl Tool for PingTool {
        type Input = NoInput;

        fn name(&self) -> &str {
            "ping"
        }

        fn description(&self) -> &str {
            "Pong."
        }

        fn execute(
            &self,
            _input: Self::Input,
        ) -> impl Future<Output = Result<String, Error>> + Send + 'static {
            ready(Ok("pong".to_owned()))
        }
    }

    fn executor() -> Executor {
        let mut executor = Executor::default();
        executor.register(TimeTool);
        executor.register(PingTool);
        executor
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "c1".to_owned(),
            name: name.to_owned(),
            arguments: arguments.to_owned(),
        }
    }

    #[test]
    fn test_definitions_keep_registration_order() {
        let names: Vec<_> = executor()
            .definitions()
            .into_iter()
            .map(|definition| definition.name)
            .collect();
        assert_eq!(names, ["get_current_time", "ping"]);
    }

    #[tokio::test]
    async fn test_success() {
        let result = executor()
            .execute(&call("get_current_time", r#"{"timezone":"UTC"}"#))
            .await
            .unwrap();
        assert_eq!(
            result,
            ToolResult {
                tool_call_id: "c1".to_owned(),
                name: "get_current_time".to_owned(),
                content: "12:00".to_owned(),
                is_error: false,
            }
        );
    }

    #[tokio::test]
    async fn test_empty_arguments() {
        let result = executor().execute(&call("ping", "")).await.unwrap();
        assert_eq!(result.content, "pong");
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn test_failures() {
        let executor = executor();
        let cases = [
            (
                call("get_weather", "{}"),
                "Unknown tool 'get_weather'. Available: get_current_time, ping.",
            ),
            (
                call("get_current_time", "{}"),
                "Missing required argument 'timezone'.",
            ),
            (
                call("get_current_time", r#"{"timezone":1}"#),
                "Argument 'timezone' must be a string.",
            ),
            (
                call("get_current_time", r#"{"timezone":"Moon"}"#),
                "Unknown timezone 'Moon'. Use an IANA name.",
            ),
            (
                call("get_current_time", r#"{"timezone":"Mars/Base"}"#),
                "Unexpected error: ZoneError: no such planet",
            ),
            (
                call("get_current_time", r#"{"timezone":"Boom"}"#),
                "Unexpected error: Panic: clock exploded",
            ),
        ];
        for (call, message) in cases {
            let result = executor.execute(&call).await.unwrap();
            assert!(result.is_error);
            assert_eq!(result.content, message);
        }

        let result = executor
            .execute(&call("get_current_time", "{timezone"))
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.content.starts_with("Invalid JSON in arguments. "));
    }

    async fn traced_call(
        sensitive: bool,
        call: ToolCall,
    ) -> (ToolResult, loupe_trace::SpanData) {
        let processor = Arc::new(RecordingProcessor::default());
        let trace = TraceBuilder::with_name("conversation")
            .with_config(TracingConfig::console().with_sensitive_data(sensitive))
            .with_processor(processor.clone())
            .build()
            .unwrap();
        let executor = executor();
        let result = trace
            .run(|_| async { executor.execute(&call).await })
            .await
            .unwrap();
        let span = processor.ended("tool").unwrap();
        (result, span.data())
    }

    #[tokio::test]
    async fn test_span_metadata() {
        let (_, data) =
            traced_call(false, call("get_current_time", r#"{"timezone":"UTC"}"#))
                .await;
        assert_eq!(data["tool_name"], SpanValue::from("get_current_time"));
        assert_eq!(data["tool_call_id"], SpanValue::from("c1"));
        assert_eq!(data["is_error"], SpanValue::from(false));
        assert_eq!(data["result_len"], SpanValue::from(5_usize));
        assert!(!data.contains_key("arguments"));
        assert!(!data.contains_key("result"));

        let (_, data) =
            traced_call(true, call("get_current_time", r#"{"timezone":"UTC"}"#))
                .await;
        assert_eq!(data["arguments"], SpanValue::from(r#"{"timezone":"UTC"}"#));
        assert_eq!(data["result"], SpanValue::from("12:00"));
    }

    #[tokio::test]
    async fn test_error_tags() {
        let cases = [
            (call("nope", "{}"), "unknown_tool"),
            (call("ping", "[1,"), "json_decode"),
            (call("get_current_time", "{}"), "validation"),
            (call("get_current_time", r#"{"timezone":"Moon"}"#), "tool_error"),
            (
                call("get_current_time", r#"{"timezone":"Mars/Base"}"#),
                "ZoneError",
            ),
        ];
        for (call, tag) in cases {
            let (result, data) = traced_call(false, call).await;
            assert!(result.is_error);
            assert_eq!(data["is_error"], SpanValue::from(true));
            assert_eq!(data["error_type"], SpanValue::from(tag));
        }
    }
}
