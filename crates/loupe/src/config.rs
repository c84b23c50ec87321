//! Configuration read from the environment.

use std::env;
use std::path::PathBuf;

use loupe_trace::{DEFAULT_PORT, TracingConfig, TracingSink};
use thiserror::Error;

/// Errors in the configuration.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} not found in environment")]
    Missing(&'static str),
    /// A variable holds a value that can't be used.
    #[error("invalid value {value:?} for {name}, expected {expected}")]
    Invalid {
        /// The variable name.
        name: &'static str,
        /// The offending value.
        value: String,
        /// What would have been accepted.
        expected: &'static str,
    },
}

/// Everything the CLI needs to start a chat.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// The API key of the model provider.
    pub api_key: String,
    /// A custom endpoint of the provider.
    pub base_url: Option<String>,
    /// The model to talk to.
    pub model: Option<String>,
    /// The system prompt.
    pub system_prompt: String,
    /// How the conversation is traced.
    pub tracing: TracingConfig,
    /// The port of the live trace viewer.
    pub live_port: u16,
}

impl AppConfig {
    /// Reads the configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `OPENAI_API_KEY` | required |
    /// | `OPENAI_BASE_URL` | provider default |
    /// | `OPENAI_MODEL` | provider default |
    /// | `LOUPE_SYSTEM_PROMPT` | a coding agent prompt naming the working directory |
    /// | `LOUPE_TRACE_SINK` | `sqlite` (`null`, `console`, `file` or `sqlite`) |
    /// | `LOUPE_TRACE_PATH` | the sink default |
    /// | `LOUPE_TRACE_SENSITIVE` | `false` |
    /// | `LOUPE_TRACE_LIVE` | `true` |
    /// | `LOUPE_LIVE_PORT` | `8765` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of
    /// a variable if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset.
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let api_key = var("OPENAI_API_KEY")
            .ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;

        let sink = match var("LOUPE_TRACE_SINK") {
            Some(value) => parse_sink(&value)?,
            None => TracingSink::Sqlite,
        };
        let live_enabled = match var("LOUPE_TRACE_LIVE") {
            Some(value) => parse_bool("LOUPE_TRACE_LIVE", &value)?,
            None => true,
        };
        let sensitive = match var("LOUPE_TRACE_SENSITIVE") {
            Some(value) => parse_bool("LOUPE_TRACE_SENSITIVE", &value)?,
            None => false,
        };
        let path = var("LOUPE_TRACE_PATH").map(PathBuf::from);

        let tracing = match sink {
            TracingSink::Null => TracingConfig::disabled(),
            TracingSink::Console => TracingConfig::console(),
            TracingSink::File => {
                let mut config = TracingConfig::default();
                if let Some(path) = path {
                    config.file_path = path;
                }
                config
            }
            TracingSink::Sqlite => {
                let mut config = TracingConfig::default();
                if let Some(path) = path {
                    config.sqlite_path = path;
                }
                TracingConfig::sqlite(config.sqlite_path, live_enabled)
            }
        }
        .with_sensitive_data(sensitive);

        let live_port = match var("LOUPE_LIVE_PORT") {
            Some(value) => {
                value.parse().map_err(|_| ConfigError::Invalid {
                    name: "LOUPE_LIVE_PORT",
                    value,
                    expected: "a port number",
                })?
            }
            None => DEFAULT_PORT,
        };

        Ok(Self {
            api_key,
            base_url: var("OPENAI_BASE_URL"),
            model: var("OPENAI_MODEL"),
            system_prompt: var("LOUPE_SYSTEM_PROMPT")
                .unwrap_or_else(default_system_prompt),
            tracing,
            live_port,
        })
    }

    /// Whether the live trace viewer should be served.
    #[inline]
    pub fn live_enabled(&self) -> bool {
        self.tracing.enabled
            && self.tracing.sink == TracingSink::Sqlite
            && self.tracing.live_enabled
    }
}

fn default_system_prompt() -> String {
    let cwd = env::current_dir()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| ".".to_owned());
    format!(
        "You are an AI coding agent. You have access to tools and can call \
         multiple tools in a single response when needed. Use tools \
         proactively to accomplish tasks. When multiple independent \
         operations are needed, call all relevant tools at once.\n\n\
         Current working directory: {cwd}"
    )
}

fn parse_sink(value: &str) -> Result<TracingSink, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "null" | "none" | "off" => Ok(TracingSink::Null),
        "console" => Ok(TracingSink::Console),
        "file" => Ok(TracingSink::File),
        "sqlite" => Ok(TracingSink::Sqlite),
        _ => Err(ConfigError::Invalid {
            name: "LOUPE_TRACE_SINK",
            value: value.to_owned(),
            expected: "one of null, console, file, sqlite",
        }),
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_owned(),
            expected: "a boolean",
        }),
    }
}
