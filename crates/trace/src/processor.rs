//! Sinks for span lifecycle events.

mod sqlite;

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

pub use sqlite::{SqliteProcessor, load_spans};

use crate::broadcaster::Broadcaster;
use crate::config::{TracingConfig, TracingSink};
use crate::error::TraceError;
use crate::record::SpanRecord;
use crate::span::Span;

/// Receives span lifecycle events and records them somewhere.
///
/// A trace owns exactly one processor, which is the single writer of that
/// trace's spans. Implementations must tolerate calls from several threads.
pub trait TraceProcessor: Send + Sync {
    /// Called right after `span` has started.
    fn on_span_start(&self, span: &Span) -> Result<(), TraceError>;

    /// Called right after `span` has finished.
    fn on_span_end(&self, span: &Span) -> Result<(), TraceError>;

    /// Releases the resources of this processor.
    fn shutdown(&self) -> Result<(), TraceError>;

    /// Whether events are also broadcast to live subscribers.
    fn supports_sse(&self) -> bool;
}

/// Creates the processor selected by `config`.
///
/// `broadcaster` is only used by the SQLite sink when live broadcasting is
/// enabled.
pub fn create_processor(
    config: &TracingConfig,
    broadcaster: Option<Broadcaster>,
) -> Result<Arc<dyn TraceProcessor>, TraceError> {
    if !config.enabled {
        return Ok(Arc::new(NullProcessor));
    }
    Ok(match config.sink {
        TracingSink::Null => Arc::new(NullProcessor),
        TracingSink::Console => Arc::new(ConsoleProcessor),
        TracingSink::File => Arc::new(FileProcessor::new(&config.file_path)?),
        TracingSink::Sqlite => {
            let broadcaster = broadcaster.filter(|_| config.live_enabled);
            if config.live_enabled && broadcaster.is_none() {
                warn!("live broadcasting is enabled without a broadcaster");
            }
            Arc::new(SqliteProcessor::open(&config.sqlite_path, broadcaster)?)
        }
    })
}

fn create_parent_dirs(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent)
        }
        _ => Ok(()),
    }
}

fn encode_line(record: &SpanRecord) -> Result<String, TraceError> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    Ok(line)
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullProcessor;

impl TraceProcessor for NullProcessor {
    fn on_span_start(&self, _span: &Span) -> Result<(), TraceError> {
        Ok(())
    }

    fn on_span_end(&self, _span: &Span) -> Result<(), TraceError> {
        Ok(())
    }

    fn shutdown(&self) -> Result<(), TraceError> {
        Ok(())
    }

    fn supports_sse(&self) -> bool {
        false
    }
}

/// Writes one JSON line per event to stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleProcessor;

impl ConsoleProcessor {
    fn write(&self, record: &SpanRecord) -> Result<(), TraceError> {
        let line = encode_line(record)?;
        let mut stderr = io::stderr().lock();
        stderr.write_all(line.as_bytes())?;
        stderr.flush()?;
        Ok(())
    }
}

impl TraceProcessor for ConsoleProcessor {
    fn on_span_start(&self, span: &Span) -> Result<(), TraceError> {
        self.write(&SpanRecord::started(span))
    }

    fn on_span_end(&self, span: &Span) -> Result<(), TraceError> {
        self.write(&SpanRecord::finished(span))
    }

    fn shutdown(&self) -> Result<(), TraceError> {
        Ok(())
    }

    fn supports_sse(&self) -> bool {
        false
    }
}

/// Appends one JSON line per event to a file.
#[derive(Debug)]
pub struct FileProcessor {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileProcessor {
    /// Opens `path` for appending, creating it and its parent directories.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, TraceError> {
        let path = path.as_ref();
        create_parent_dirs(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_owned(),
            file: Mutex::new(file),
        })
    }

    /// Returns the output path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, record: &SpanRecord) -> Result<(), TraceError> {
        let line = encode_line(record)?;
        self.file.lock().write_all(line.as_bytes())?;
        Ok(())
    }
}

impl TraceProcessor for FileProcessor {
    fn on_span_start(&self, span: &Span) -> Result<(), TraceError> {
        self.write(&SpanRecord::started(span))
    }

    fn on_span_end(&self, span: &Span) -> Result<(), TraceError> {
        self.write(&SpanRecord::finished(span))
    }

    fn shutdown(&self) -> Result<(), TraceError> {
        self.file.lock().flush()?;
        Ok(())
    }

    fn supports_sse(&self) -> bool {
        false
    }
}
