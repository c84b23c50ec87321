//! Seams between the chat loop and whatever renders it.

/// Renders a conversation to the user.
///
/// Calls arrive in the order the underlying events happen, from the task
/// driving the chat. Implementations decide formatting and spacing based on
/// the markers they receive.
pub trait OutputHandler: Send + Sync {
    /// Shows a piece of reasoning text.
    ///
    /// `is_first` is set for the first piece of the response.
    fn display_reasoning(&self, delta: &str, is_first: bool);

    /// Shows a piece of answer text.
    ///
    /// `is_first` is set for the first piece of the response, and
    /// `has_reasoning` tells whether a reasoning block was shown before it.
    fn display_content(
        &self,
        delta: &str,
        is_first: bool,
        has_reasoning: bool,
    );

    /// Marks the beginning of a new tool call in the response.
    fn display_tool_call_start(&self);

    /// Shows the name of the tool being called, once known.
    fn display_tool_call_name(&self, name: &str);

    /// Shows a fully received tool call.
    fn display_tool_call(&self, name: &str, arguments: &str);

    /// Shows the outcome of a tool call.
    fn display_tool_result(&self, content: &str, is_error: bool);

    /// Reports an error.
    fn display_error(&self, message: &str);

    /// Shows an informational line.
    fn display_info(&self, message: &str);

    /// Greets the user when the conversation starts.
    fn display_welcome(&self);

    /// Says goodbye when the conversation ends.
    fn display_goodbye(&self);

    /// Ends the current line of output.
    fn newline(&self);
}

/// An indicator shown while waiting for the model.
///
/// Both operations must be idempotent, `stop` is called whenever output is
/// about to be shown, whether or not the indicator runs.
pub trait LoadingIndicator: Send + Sync {
    /// Shows the indicator.
    fn start(&self);

    /// Hides the indicator.
    fn stop(&self);
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Silent;

impl OutputHandler for Silent {
    fn display_reasoning(&self, _delta: &str, _is_first: bool) {}

    fn display_content(
        &self,
        _delta: &str,
        _is_first: bool,
        _has_reasoning: bool,
    ) {
    }

    fn display_tool_call_start(&self) {}

    fn display_tool_call_name(&self, _name: &str) {}

    fn display_tool_call(&self, _name: &str, _arguments: &str) {}

    fn display_tool_result(&self, _content: &str, _is_error: bool) {}

    fn display_error(&self, _message: &str) {}

    fn display_info(&self, _message: &str) {}

    fn display_welcome(&self) {}

    fn display_goodbye(&self) {}

    fn newline(&self) {}
}

impl LoadingIndicator for Silent {
    fn start(&self) {}

    fn stop(&self) {}
}

#[cfg(test)]
pub(crate) mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Event {
        StartIndicator,
        StopIndicator,
        Reasoning(String, bool),
        Content(String, bool, bool),
        ToolCallStart,
        ToolCallName(String),
        ToolCall(String, String),
        ToolResult(String, bool),
        Error(String),
        Info(String),
        Welcome,
        Goodbye,
        Newline,
    }

    /// Records every call, for both output and indicator.
    #[derive(Default)]
    pub struct Recorder {
        events: Mutex<Vec<Event>>,
    }

    impl Recorder {
        pub fn events(&self) -> Vec<Event> {
            self.events.lock().clone()
        }

        pub fn count(&self, event: &Event) -> usize {
            self.events.lock().iter().filter(|e| *e == event).count()
        }

        fn push(&self, event: Event) {
            self.events.lock().push(event);
        }
    }

    impl OutputHandler for Recorder {
        fn display_reasoning(&self, delta: &str, is_first: bool) {
            self.push(Event::Reasoning(delta.to_owned(), is_first));
        }

        fn display_content(
            &self,
            delta: &str,
            is_first: bool,
            has_reasoning: bool,
        ) {
            self.push(Event::Content(delta.to_owned(), is_first, has_reasoning));
        }

        fn display_tool_call_start(&self) {
            self.push(Event::ToolCallStart);
        }

        fn display_tool_call_name(&self, name: &str) {
            self.push(Event::ToolCallName(name.to_owned()));
        }

        fn display_tool_call(&self, name: &str, arguments: &str) {
            self.push(Event::ToolCall(name.to_owned(), arguments.to_owned()));
        }

        fn display_tool_result(&self, content: &str, is_error: bool) {
            self.push(Event::ToolResult(content.to_owned(), is_error));
        }

        fn display_error(&self, message: &str) {
            self.push(Event::Error(message.to_owned()));
        }

        fn display_info(&self, message: &str) {
            self.push(Event::Info(message.to_owned()));
        }

        fn display_welcome(&self) {
            self.push(Event::Welcome);
        }

        fn display_goodbye(&self) {
            self.push(Event::Goodbye);
        }

        fn newline(&self) {
            self.push(Event::Newline);
        }
    }

    impl LoadingIndicator for Recorder {
        fn start(&self) {
            self.push(Event::StartIndicator);
        }

        fn stop(&self) {
            self.push(Event::StopIndicator);
        }
    }
}
