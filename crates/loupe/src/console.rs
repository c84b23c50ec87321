//! Terminal input and output.

use std::io::{self, Write};

use loupe_core::InputSource;
use loupe_core::output::OutputHandler;
use owo_colors::OwoColorize;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};

const REASONING_INDENT: &str = "    ";

/// Renders the conversation to stdout, and errors to stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleOutput;

impl OutputHandler for ConsoleOutput {
    fn display_reasoning(&self, delta: &str, is_first: bool) {
        emit(io::stdout(), &render_reasoning(delta, is_first));
    }

    fn display_content(
        &self,
        delta: &str,
        is_first: bool,
        has_reasoning: bool,
    ) {
        emit(io::stdout(), &render_content(delta, is_first, has_reasoning));
    }

    fn display_tool_call_start(&self) {}

    fn display_tool_call_name(&self, _name: &str) {}

    fn display_tool_call(&self, name: &str, arguments: &str) {
        emit(io::stdout(), &render_tool_call(name, arguments));
    }

    fn display_tool_result(&self, content: &str, is_error: bool) {
        emit(io::stdout(), &render_tool_result(content, is_error));
    }

    fn display_error(&self, message: &str) {
        let line = format!("Error: {message}");
        emit(io::stderr(), &format!("\n{}\n", line.red()));
    }

    fn display_info(&self, message: &str) {
        emit(io::stdout(), &format!("{}\n", message.cyan()));
    }

    fn display_welcome(&self) {
        let line = "Chat started. Type 'exit' to quit.";
        emit(io::stdout(), &format!("{}\n\n", line.cyan()));
    }

    fn display_goodbye(&self) {
        emit(io::stdout(), &format!("\n{} {}\n", "➤".cyan(), "Bye!".green()));
    }

    fn newline(&self) {
        emit(io::stdout(), "\n");
    }
}

fn emit<W: Write>(mut out: W, text: &str) {
    if let Err(err) = out.write_all(text.as_bytes()).and_then(|_| out.flush())
    {
        debug!("failed to write to the console: {err}");
    }
}

fn render_reasoning(delta: &str, is_first: bool) -> String {
    let indented = delta.replace('\n', &format!("\n{REASONING_INDENT}"));
    if is_first {
        format!(
            "\n{} {}\n{}",
            "↪".cyan().dimmed(),
            "Thinking".white().dimmed(),
            format!("{REASONING_INDENT}{indented}").white().dimmed()
        )
    } else {
        indented.white().dimmed().to_string()
    }
}

fn render_content(delta: &str, is_first: bool, has_reasoning: bool) -> String {
    let separator = match (is_first, has_reasoning) {
        (false, _) => "",
        (true, true) => "\n\n",
        (true, false) => "\n",
    };
    format!("{separator}{}", delta.green())
}

fn render_tool_call(name: &str, arguments: &str) -> String {
    let head = format!("⚡ {name}");
    let arguments = arguments.trim();
    if arguments.is_empty() || arguments == "{}" {
        format!("\n{}()\n", head.cyan())
    } else {
        format!("\n{}({})\n", head.cyan(), arguments.dimmed())
    }
}

fn render_tool_result(content: &str, is_error: bool) -> String {
    if is_error {
        format!("   {}\n", format!("✗ {content}").red())
    } else {
        format!("   {}\n", format!("→ {content}").green())
    }
}

/// Reads user messages from stdin, prompting for each one.
pub struct ConsoleInput {
    reader: BufReader<Stdin>,
}

impl ConsoleInput {
    /// Creates an input reading from stdin.
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
        }
    }
}

impl Default for ConsoleInput {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for ConsoleInput {
    fn next_line(&mut self) -> impl Future<Output = Option<String>> + Send {
        async move {
            emit(io::stdout(), &format!("\n{} ", "User:".blue()));

            let mut line = String::new();
            match self.reader.read_line(&mut line).await {
                Ok(0) => None,
                Ok(_) => Some(line),
                Err(err) => {
                    error!("error reading input: {err}");
                    None
                }
            }
        }
    }
}
