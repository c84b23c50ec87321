//! Hierarchical timing spans for a conversation, and the sinks that record
//! them.
//!
//! A [`Trace`] owns one processor and one root span. Spans created while a
//! trace is running pick up the current span as their parent, so call sites
//! never wire parents by hand:
//!
//! ```no_run
//! # use loupe_trace::{SpanKind, TraceBuilder, TraceError, TracingConfig, span};
//! # async fn demo() -> Result<(), TraceError> {
//! let trace = TraceBuilder::with_name("conversation")
//!     .with_config(TracingConfig::console())
//!     .build()?;
//! trace
//!     .run(|_root| async {
//!         span("turn", SpanKind::Turn)
//!             .run(|turn| async move {
//!                 turn.set("model", "gpt-5.2");
//!                 Ok::<_, TraceError>(())
//!             })
//!             .await
//!     })
//!     .await?;
//! trace.shutdown()
//! # }
//! ```

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod broadcaster;
mod config;
mod context;
mod error;
mod processor;
mod record;
mod server;
mod span;
mod trace;
mod types;

pub use broadcaster::{Broadcaster, SUBSCRIBER_CAPACITY, Subscription};
pub use config::{TracingConfig, TracingSink};
pub use context::{current_span, current_trace};
pub use error::{SpanError, TraceError};
pub use processor::{
    ConsoleProcessor, FileProcessor, NullProcessor, SqliteProcessor,
    TraceProcessor, create_processor, load_spans,
};
pub use record::{RecordStatus, SpanRecord};
pub use server::{DEFAULT_PORT, KEEPALIVE_INTERVAL, LiveServer, RunningServer};
pub use span::{Span, SpanGuard};
pub use trace::{NO_TRACE_ID, Trace, TraceBuilder, span};
pub use types::{SpanData, SpanKind, SpanStatus, SpanValue};
