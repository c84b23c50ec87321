use std::collections::VecDeque;
use std::future::ready;
use std::sync::Arc;

use loupe_model::{Role, ToolCallDelta};
use loupe_test_model::{PresetChunk, PresetResponse, TestModelProvider};
use loupe_trace::{SpanStatus, SpanValue, TracingConfig};
use schemars::JsonSchema;
use serde::Deserialize;

use super::*;
use crate::output::tests::{Event, Recorder};
use crate::testing::RecordingProcessor;
use crate::tool::{Error as ToolError, Tool};

struct ScriptedInput {
    lines: VecDeque<String>,
}

impl ScriptedInput {
    fn new<const N: usize>(lines: [&str; N]) -> Self {
        Self {
            lines: lines.into_iter().map(str::to_owned).collect(),
        }
    }
}

impl InputSource for ScriptedInput {
    fn next_line(&mut self) -> impl Future<Output = Option<String>> + Send {
        ready(self.lines.pop_front())
    }
}

#[derive(Deserialize, JsonSchema)]
struct NoInput {}

struct GetTime;

impl Tool for GetTime {
    type Input = NoInput;

    fn name(&self) -> &str {
        "get_time"
    }

    fn description(&self) -> &str {
        "Returns the current time."
    }

    fn execute(
        &self,
        _input: Self::Input,
    ) -> impl Future<Output = Result<String, ToolError>> + Send + 'static {
        ready(Ok("12:00".to_owned()))
    }
}

fn content(text: &str) -> PresetResponse {
    PresetResponse::with_chunks([PresetChunk::Content(text.to_owned())])
}

fn tool_call(id: &str) -> PresetResponse {
    PresetResponse::with_chunks([
        PresetChunk::ToolCall(ToolCallDelta::start(0, id, "get_time")),
        PresetChunk::ToolCall(ToolCallDelta::arguments(0, "{}")),
    ])
}

struct Harness {
    chat: Chat,
    model_provider: TestModelProvider,
    recorder: Arc<Recorder>,
    processor: Arc<RecordingProcessor>,
}

fn harness(responses: Vec<PresetResponse>, tracing: TracingConfig) -> Harness {
    let mut model_provider = TestModelProvider::default();
    for response in responses {
        model_provider.add_response(response);
    }
    let recorder = Arc::new(Recorder::default());
    let processor = Arc::new(RecordingProcessor::default());
    let chat = ChatBuilder::with_model_provider(model_provider.clone())
        .with_system_prompt("You are a test.")
        .with_tool(GetTime)
        .with_output(recorder.clone())
        .with_loading_indicator(recorder.clone())
        .with_tracing(tracing)
        .with_trace_processor(processor.clone())
        .build();
    Harness {
        chat,
        model_provider,
        recorder,
        processor,
    }
}

#[tokio::test]
async fn test_simple_message() {
    let Harness {
        mut chat,
        model_provider,
        recorder,
        ..
    } = harness(vec![content("Hi")], TracingConfig::disabled());

    chat.send("Hello").await.unwrap();

    let messages = chat.history().messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(messages[1].content, "Hello");
    assert_eq!(messages[2].role, Role::Assistant);
    assert_eq!(messages[2].content, "Hi");

    let requests = model_provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].messages.len(), 2);
    assert_eq!(requests[0].tools[0].name, "get_time");

    assert_eq!(
        recorder.events(),
        [
            Event::StartIndicator,
            Event::StopIndicator,
            Event::Content("Hi".to_owned(), true, false),
            Event::Newline,
        ]
    );
}

#[tokio::test]
async fn test_tool_round_trip() {
    let Harness {
        mut chat,
        model_provider,
        recorder,
        ..
    } = harness(
        vec![tool_call("c1"), content("It is noon.")],
        TracingConfig::disabled(),
    );

    chat.send("What time is it?").await.unwrap();

    let messages = chat.history().messages();
    let roles: Vec<_> = messages.iter().map(|msg| msg.role).collect();
    assert_eq!(
        roles,
        [
            Role::System,
            Role::User,
            Role::Assistant,
            Role::Tool,
            Role::Assistant,
        ]
    );
    assert_eq!(messages[2].tool_calls[0].id, "c1");
    assert_eq!(messages[2].tool_calls[0].arguments, "{}");
    assert_eq!(messages[3].tool_call_id.as_deref(), Some("c1"));
    assert_eq!(messages[3].content, "12:00");
    assert_eq!(messages[4].content, "It is noon.");

    // The second request carries the tool result.
    let requests = model_provider.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 4);
    assert_eq!(requests[1].messages[3].role, Role::Tool);

    let events = recorder.events();
    assert!(events.contains(&Event::ToolCall(
        "get_time".to_owned(),
        "{}".to_owned()
    )));
    assert!(events.contains(&Event::ToolResult("12:00".to_owned(), false)));
    assert_eq!(recorder.count(&Event::StartIndicator), 2);
}

#[tokio::test]
async fn test_unknown_tool_is_reported_to_model() {
    let unknown = PresetResponse::with_chunks([PresetChunk::ToolCall(
        ToolCallDelta::start(0, "c1", "get_weather"),
    )]);
    let Harness { mut chat, .. } =
        harness(vec![unknown, content("Sorry.")], TracingConfig::disabled());

    chat.send("Weather?").await.unwrap();

    let tool_message = &chat.history().messages()[3];
    assert_eq!(tool_message.role, Role::Tool);
    assert_eq!(
        tool_message.content,
        "Unknown tool 'get_weather'. Available: get_time."
    );
}

#[tokio::test]
async fn test_run_records_spans() {
    let Harness {
        mut chat,
        recorder,
        processor,
        ..
    } = harness(
        vec![tool_call("c1"), content("Noon.")],
        TracingConfig::console(),
    );

    let mut input = ScriptedInput::new(["", "  What time is it?  ", "EXIT"]);
    chat.run(&mut input).await.unwrap();

    let events = recorder.events();
    assert_eq!(events.first(), Some(&Event::Welcome));
    assert_eq!(events.last(), Some(&Event::Goodbye));
    assert_eq!(chat.history().messages()[1].content, "What time is it?");

    let root = processor.ended("conversation").unwrap();
    let turn = processor.ended("turn").unwrap();
    let llms = processor.named("llm");
    let tool = processor.ended("tool").unwrap();

    assert_eq!(root.parent_id(), None);
    assert_eq!(root.status(), SpanStatus::Ok);
    assert_eq!(turn.parent_id(), Some(root.span_id()));
    assert_eq!(turn.get("model"), Some(SpanValue::from("test-model")));

    assert_eq!(llms.len(), 2);
    for llm in &llms {
        assert_eq!(llm.parent_id(), Some(turn.span_id()));
        assert_eq!(llm.get("tool_count"), Some(SpanValue::from(1_usize)));
        assert!(llm.get("messages").is_none());
    }
    // Tools run inside the request that asked for them.
    assert_eq!(tool.parent_id(), Some(llms[0].span_id()));
    assert_eq!(
        llms[0].get("tool_call_count"),
        Some(SpanValue::from(1_usize))
    );
    assert_eq!(llms[0].get("has_content"), Some(SpanValue::from(false)));
    assert_eq!(llms[1].get("has_content"), Some(SpanValue::from(true)));
    assert_eq!(llms[1].get("message_count"), Some(SpanValue::from(4_usize)));

    // Children finish before their parents.
    let names: Vec<_> = processor
        .spans()
        .iter()
        .map(|span| span.name().to_owned())
        .collect();
    assert_eq!(names, ["tool", "llm", "llm", "turn", "conversation"]);
}

#[tokio::test]
async fn test_sensitive_messages() {
    let Harness {
        mut chat,
        processor,
        ..
    } = harness(
        vec![content("Hi")],
        TracingConfig::console().with_sensitive_data(true),
    );

    let mut input = ScriptedInput::new(["Hello"]);
    chat.run(&mut input).await.unwrap();

    let llm = processor.ended("llm").unwrap();
    let Some(SpanValue::String(messages)) = llm.get("messages") else {
        panic!("messages are not recorded");
    };
    let messages: serde_json::Value = serde_json::from_str(&messages).unwrap();
    assert_eq!(messages[1]["content"], "Hello");
}

#[tokio::test]
async fn test_failed_request_is_reported() {
    let Harness {
        mut chat,
        recorder,
        processor,
        ..
    } = harness(
        vec![PresetResponse::rejected("model is overloaded"), content("Hi")],
        TracingConfig::console(),
    );

    let mut input = ScriptedInput::new(["Hello", "Hello again", "quit"]);
    chat.run(&mut input).await.unwrap();

    assert_eq!(
        recorder.count(&Event::Error("model is overloaded".to_owned())),
        1
    );
    let messages = chat.history().messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[3].content, "Hi");

    let turns = processor.named("turn");
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].status(), SpanStatus::Error);
    assert_eq!(
        turns[0].error().as_deref(),
        Some("ModelError: model is overloaded")
    );
    assert_eq!(turns[1].status(), SpanStatus::Ok);
    assert_eq!(
        processor.ended("conversation").unwrap().status(),
        SpanStatus::Ok
    );
}

#[tokio::test]
async fn test_rate_limit_is_named_on_turn() {
    let Harness {
        mut chat,
        recorder,
        processor,
        ..
    } = harness(vec![], TracingConfig::console());

    let mut input = ScriptedInput::new(["Hello"]);
    chat.run(&mut input).await.unwrap();

    assert_eq!(
        recorder.count(&Event::Error("no enough responses".to_owned())),
        1
    );
    let turn = processor.ended("turn").unwrap();
    assert_eq!(
        turn.error().as_deref(),
        Some("RateLimitExceeded: no enough responses")
    );
}

#[tokio::test]
async fn test_stream_failure_is_reported_once() {
    let failing = PresetResponse::with_chunks([
        PresetChunk::Content("Hal".to_owned()),
        PresetChunk::Fail("connection reset".to_owned()),
    ]);
    let Harness {
        mut chat,
        recorder,
        processor,
        ..
    } = harness(vec![failing], TracingConfig::console());

    let mut input = ScriptedInput::new(["Hello"]);
    chat.run(&mut input).await.unwrap();

    let errors: Vec<_> = recorder
        .events()
        .into_iter()
        .filter(|event| matches!(event, Event::Error(_)))
        .collect();
    assert_eq!(
        errors,
        [Event::Error(
            "Error processing response: connection reset".to_owned()
        )]
    );
    // The partial answer is not kept.
    assert_eq!(chat.history().len(), 2);

    let llm = processor.ended("llm").unwrap();
    assert_eq!(
        llm.error().as_deref(),
        Some("StreamError: connection reset")
    );
}

#[tokio::test]
async fn test_interrupt() {
    let Harness {
        mut chat,
        recorder,
        processor,
        model_provider,
    } = harness(vec![content("Hi")], TracingConfig::console());

    let mut input = ScriptedInput::new(["Hello"]);
    chat.run_until(&mut input, ready(())).await.unwrap();

    assert_eq!(recorder.events(), [Event::Welcome, Event::Goodbye]);
    assert!(model_provider.requests().is_empty());
    assert_eq!(
        processor.ended("conversation").unwrap().status(),
        SpanStatus::Ok
    );
}

#[tokio::test]
async fn test_exit_commands() {
    for command in ["exit", "Quit", " BYE "] {
        let Harness {
            mut chat,
            model_provider,
            ..
        } = harness(vec![], TracingConfig::console());

        let mut input = ScriptedInput::new([command, "Hello"]);
        chat.run(&mut input).await.unwrap();
        assert!(model_provider.requests().is_empty());
    }
}
