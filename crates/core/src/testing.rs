//! Helpers shared by tests.

use loupe_trace::{Span, TraceError, TraceProcessor};
use parking_lot::Mutex;

/// Keeps every finished span in memory.
#[derive(Default)]
pub struct RecordingProcessor {
    ended: Mutex<Vec<Span>>,
}

impl RecordingProcessor {
    /// Returns finished spans, in the order they finished.
    pub fn spans(&self) -> Vec<Span> {
        self.ended.lock().clone()
    }

    /// Returns the last finished span with the given name.
    pub fn ended(&self, name: &str) -> Option<Span> {
        self.ended
            .lock()
            .iter()
            .rev()
            .find(|span| span.name() == name)
            .cloned()
    }

    /// Returns all finished spans with the given name.
    pub fn named(&self, name: &str) -> Vec<Span> {
        self.ended
            .lock()
            .iter()
            .filter(|span| span.name() == name)
            .cloned()
            .collect()
    }
}

impl TraceProcessor for RecordingProcessor {
    fn on_span_start(&self, _span: &Span) -> Result<(), TraceError> {
        Ok(())
    }

    fn on_span_end(&self, span: &Span) -> Result<(), TraceError> {
        self.ended.lock().push(span.clone());
        Ok(())
    }

    fn shutdown(&self) -> Result<(), TraceError> {
        Ok(())
    }

    fn supports_sse(&self) -> bool {
        false
    }
}
