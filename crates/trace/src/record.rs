use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::span::Span;
use crate::types::{SpanData, SpanKind, SpanStatus};

/// The status stored for a lifecycle event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// The span has started and not finished yet.
    Running,
    /// The span finished successfully.
    Ok,
    /// The span finished with an error.
    Error,
}

impl RecordStatus {
    /// Returns the stored name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Running => "running",
            RecordStatus::Ok => "ok",
            RecordStatus::Error => "error",
        }
    }
}

impl From<SpanStatus> for RecordStatus {
    fn from(status: SpanStatus) -> Self {
        match status {
            SpanStatus::Ok => RecordStatus::Ok,
            SpanStatus::Error => RecordStatus::Error,
        }
    }
}

/// One span lifecycle event, as written by the processors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpanRecord {
    /// Time of the event, ISO-8601 UTC with milliseconds.
    pub ts: String,
    /// Id of the owning trace.
    pub trace_id: String,
    /// Id of the span.
    pub span_id: String,
    /// Id of the enclosing span.
    pub parent_id: Option<String>,
    /// Span name.
    pub name: String,
    /// Span kind.
    pub kind: SpanKind,
    /// Elapsed milliseconds, absent for start events.
    pub duration_ms: Option<f64>,
    /// Lifecycle status.
    pub status: RecordStatus,
    /// Metadata at the time of the event.
    pub data: SpanData,
    /// Recorded error message.
    pub error: Option<String>,
}

impl SpanRecord {
    /// Captures the start event of `span`.
    pub fn started(span: &Span) -> Self {
        Self {
            status: RecordStatus::Running,
            ..Self::snapshot(span)
        }
    }

    /// Captures the end event of `span`.
    pub fn finished(span: &Span) -> Self {
        Self::snapshot(span)
    }

    fn snapshot(span: &Span) -> Self {
        Self {
            ts: now_timestamp(),
            trace_id: span.trace_id().to_owned(),
            span_id: span.span_id().to_owned(),
            parent_id: span.parent_id().map(ToOwned::to_owned),
            name: span.name().to_owned(),
            kind: span.kind(),
            duration_ms: span.duration_ms(),
            status: span.status().into(),
            data: span.data(),
            error: span.error(),
        }
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, false)
}
