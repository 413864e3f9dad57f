//! Lifecycle events emitted by the orchestrator and the health monitor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use uuid::Uuid;

use super::{CompositeHealth, RunMode};

/// An observability event.
///
/// Events are consumed by [`EventSink`](crate::events::EventSink)
/// implementations for logging, monitoring, or test assertions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEvent {
    /// The event type (e.g., "stage.started", "health.checked").
    #[serde(rename = "type")]
    pub event_type: String,

    /// When the event occurred.
    pub timestamp: DateTime<Utc>,

    /// The event payload.
    #[serde(default)]
    pub data: Map<String, serde_json::Value>,
}

impl WatchEvent {
    /// Creates a new event with an empty payload.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: Utc::now(),
            data: Map::new(),
        }
    }

    /// Adds a data field to the event.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Returns a payload field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Creates a "pipeline.started" event.
    #[must_use]
    pub fn pipeline_started(run_id: Uuid, mode: RunMode, total: usize) -> Self {
        Self::new("pipeline.started")
            .add_data("run_id", serde_json::json!(run_id))
            .add_data("mode", serde_json::json!(mode))
            .add_data("total", serde_json::json!(total))
    }

    /// Creates a "pipeline.completed" event.
    #[must_use]
    pub fn pipeline_completed(run_id: Uuid, completed: usize, total: usize) -> Self {
        Self::new("pipeline.completed")
            .add_data("run_id", serde_json::json!(run_id))
            .add_data("completed", serde_json::json!(completed))
            .add_data("total", serde_json::json!(total))
    }

    /// Creates a "pipeline.halted" event.
    #[must_use]
    pub fn pipeline_halted(run_id: Uuid, stage: &str, error: &str) -> Self {
        Self::new("pipeline.halted")
            .add_data("run_id", serde_json::json!(run_id))
            .add_data("stage", serde_json::json!(stage))
            .add_data("error", serde_json::json!(error))
    }

    /// Creates a "stage.started" event.
    #[must_use]
    pub fn stage_started(run_id: Uuid, stage: &str, index: usize) -> Self {
        Self::new("stage.started")
            .add_data("run_id", serde_json::json!(run_id))
            .add_data("stage", serde_json::json!(stage))
            .add_data("index", serde_json::json!(index))
    }

    /// Creates a "stage.completed" event.
    #[must_use]
    pub fn stage_completed(run_id: Uuid, stage: &str, duration_ms: i64) -> Self {
        Self::new("stage.completed")
            .add_data("run_id", serde_json::json!(run_id))
            .add_data("stage", serde_json::json!(stage))
            .add_data("duration_ms", serde_json::json!(duration_ms))
    }

    /// Creates a "stage.failed" event.
    #[must_use]
    pub fn stage_failed(run_id: Uuid, stage: &str, error: &str) -> Self {
        Self::new("stage.failed")
            .add_data("run_id", serde_json::json!(run_id))
            .add_data("stage", serde_json::json!(stage))
            .add_data("error", serde_json::json!(error))
    }

    /// Creates a "health.checked" event.
    #[must_use]
    pub fn health_checked(composite: CompositeHealth, healthy: usize, total: usize) -> Self {
        Self::new("health.checked")
            .add_data("composite", serde_json::json!(composite))
            .add_data("healthy", serde_json::json!(healthy))
            .add_data("total", serde_json::json!(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_add_data() {
        let event = WatchEvent::new("test.event")
            .add_data("foo", serde_json::json!("bar"))
            .add_data("count", serde_json::json!(42));

        assert_eq!(event.event_type, "test.event");
        assert_eq!(event.data.len(), 2);
        assert_eq!(event.get("count"), Some(&serde_json::json!(42)));
    }

    #[test]
    fn test_stage_failed_event() {
        let run_id = Uuid::new_v4();
        let event = WatchEvent::stage_failed(run_id, "Sync FHIR", "connection refused");

        assert_eq!(event.event_type, "stage.failed");
        assert_eq!(event.get("stage"), Some(&serde_json::json!("Sync FHIR")));
        assert_eq!(event.get("error"), Some(&serde_json::json!("connection refused")));
    }

    #[test]
    fn test_health_checked_event() {
        let event = WatchEvent::health_checked(CompositeHealth::Degraded, 3, 5);
        assert_eq!(event.get("composite"), Some(&serde_json::json!("degraded")));
        assert_eq!(event.get("healthy"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn test_event_serializes_type_field() {
        let event = WatchEvent::new("pipeline.started");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "pipeline.started");
    }
}
