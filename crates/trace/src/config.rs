use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where spans are written.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TracingSink {
    /// Discard everything.
    Null,
    /// One JSON line per event on stderr.
    Console,
    /// One JSON line per event appended to a file.
    #[default]
    File,
    /// A SQLite database, optionally broadcasting live.
    Sqlite,
}

/// Configuration for the tracing system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// When `false`, every span is discarded regardless of `sink`.
    pub enabled: bool,
    /// The sink to write to.
    pub sink: TracingSink,
    /// Output path of the file sink.
    pub file_path: PathBuf,
    /// Database path of the SQLite sink.
    pub sqlite_path: PathBuf,
    /// Whether payloads (messages, tool arguments and results) are captured.
    pub include_sensitive_data: bool,
    /// Whether the SQLite sink publishes every event to live subscribers.
    pub live_enabled: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sink: TracingSink::File,
            file_path: "traces.jsonl".into(),
            sqlite_path: "traces.sqlite3".into(),
            include_sensitive_data: false,
            live_enabled: false,
        }
    }
}

impl TracingConfig {
    /// A configuration that records nothing.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            sink: TracingSink::Null,
            ..Default::default()
        }
    }

    /// Writes spans to stderr.
    pub fn console() -> Self {
        Self {
            sink: TracingSink::Console,
            ..Default::default()
        }
    }

    /// Appends spans to the given file.
    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            sink: TracingSink::File,
            file_path: path.into(),
            ..Default::default()
        }
    }

    /// Stores spans in the given database.
    pub fn sqlite<P: Into<PathBuf>>(path: P, live_enabled: bool) -> Self {
        Self {
            sink: TracingSink::Sqlite,
            sqlite_path: path.into(),
            live_enabled,
            ..Default::default()
        }
    }

    /// Enables capturing payloads.
    pub fn with_sensitive_data(mut self, enabled: bool) -> Self {
        self.include_sensitive_data = enabled;
        self
    }
}
