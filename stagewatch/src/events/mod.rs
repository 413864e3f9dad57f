//! Event emission for observability.
//!
//! The orchestrator and the health monitor each hold an `Arc<dyn EventSink>`
//! supplied at construction. There is no process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use std::sync::Arc;

/// Returns the sink used when the caller supplies none.
#[must_use]
pub fn default_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpEventSink)
}
