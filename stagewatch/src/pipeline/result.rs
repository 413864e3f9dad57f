//! Stage results, run records and run summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Stage;
use crate::core::{RunMode, RunState, StageStatus};

/// Outcome of one stage within one run.
///
/// Created in `Running` when the stage is issued and finalized exactly once
/// with [`succeed`](Self::succeed) or [`fail`](Self::fail).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// Label of the stage this result belongs to.
    pub stage: String,
    /// Declaration position of the stage.
    pub ordinal: usize,
    /// Current status.
    pub status: StageStatus,
    /// Response body of a successful stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Human-readable message of a failed stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the stage was issued.
    pub started_at: DateTime<Utc>,
    /// When the stage settled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl StageResult {
    /// Creates a running result for `stage` at position `ordinal`.
    #[must_use]
    pub fn started(stage: &Stage, ordinal: usize) -> Self {
        Self {
            stage: stage.label.clone(),
            ordinal,
            status: StageStatus::Running,
            payload: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Settles the result with a payload.
    #[must_use]
    pub fn succeed(mut self, payload: serde_json::Value) -> Self {
        self.status = StageStatus::Success;
        self.payload = Some(payload);
        self.finished_at = Some(Utc::now());
        self
    }

    /// Settles the result with an error message.
    #[must_use]
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.status = StageStatus::Error;
        self.error = Some(message.into());
        self.finished_at = Some(Utc::now());
        self
    }

    /// Returns true if the stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the stage failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    /// Wall-clock duration in milliseconds, once settled.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds())
    }

    /// Typed view over the payload of a successful stage.
    #[must_use]
    pub fn summary(&self) -> Option<StagePayload> {
        self.payload.as_ref().map(StagePayload::from_value)
    }
}

/// Counters reported by the processing services.
///
/// Payloads are not validated: a field that is missing or not a non-negative
/// integer is simply `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagePayload {
    /// Records pulled by the sync stage.
    pub synced: Option<u64>,
    /// Records the sync stage could not pull.
    pub failed: Option<u64>,
    /// Resources written by the sync stage.
    pub total_resources: Option<u64>,
    /// Records anonymized.
    pub anonymized: Option<u64>,
    /// Feature rows extracted.
    pub extracted: Option<u64>,
    /// Records scored.
    pub predicted: Option<u64>,
    /// Per-record errors reported by extraction or prediction.
    pub errors: Option<u64>,
}

impl StagePayload {
    /// Reads the known counters out of a response body.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Self {
        let field = |name: &str| value.get(name).and_then(serde_json::Value::as_u64);
        Self {
            synced: field("synced"),
            failed: field("failed"),
            total_resources: field("totalResources"),
            anonymized: field("anonymized"),
            extracted: field("extracted"),
            predicted: field("predicted"),
            errors: field("errors"),
        }
    }

    /// Returns true if the service reported per-record errors or failures.
    #[must_use]
    pub fn has_partial_failures(&self) -> bool {
        self.errors.unwrap_or(0) > 0 || self.failed.unwrap_or(0) > 0
    }
}

/// The record of one orchestrator invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique id of the run.
    pub run_id: Uuid,
    /// Full sequence or single stage.
    pub mode: RunMode,
    /// Number of stages this run intends to execute.
    pub total: usize,
    /// Settled results, in declaration order.
    pub results: Vec<StageResult>,
    /// Where the run is in its state machine.
    pub state: RunState,
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// When the run settled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// Starts a new, empty run.
    #[must_use]
    pub fn begin(mode: RunMode, total: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            total,
            results: Vec::new(),
            state: RunState::Idle,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Appends a settled result.
    ///
    /// Results are append-only and must arrive in declaration order with at
    /// most one per stage; anything else is dropped.
    pub fn record(&mut self, result: StageResult) -> bool {
        let in_order = self
            .results
            .last()
            .map_or(true, |last| last.ordinal < result.ordinal);
        if !in_order || !result.status.is_terminal() {
            tracing::warn!(
                run_id = %self.run_id,
                stage = %result.stage,
                "Ignoring out-of-order or unsettled stage result"
            );
            return false;
        }
        self.results.push(result);
        true
    }

    /// Marks the run settled in `state`.
    pub fn finish(&mut self, state: RunState) {
        self.state = state;
        self.finished_at = Some(Utc::now());
    }

    /// Number of stages that succeeded.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Returns the result recorded for `label`, if any.
    #[must_use]
    pub fn result_for(&self, label: &str) -> Option<&StageResult> {
        self.results.iter().find(|r| r.stage == label)
    }

    /// Produces the caller-facing summary.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            mode: self.mode,
            completed_count: self.completed_count(),
            total: self.total,
            results: self.results.clone(),
            state: self.state,
        }
    }
}

/// What a run returns: `{completed_count, total, results}` plus its final state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Id of the run this summarizes.
    pub run_id: Uuid,
    /// Full sequence or single stage.
    pub mode: RunMode,
    /// Number of stages that succeeded.
    pub completed_count: usize,
    /// Number of stages the run intended to execute.
    pub total: usize,
    /// Settled results in declaration order.
    pub results: Vec<StageResult>,
    /// Final state.
    pub state: RunState,
}

impl RunSummary {
    /// Returns true iff every intended stage succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_count == self.total && self.results.len() == self.total
    }

    /// Returns the failing result, if the run stopped on one.
    #[must_use]
    pub fn failure(&self) -> Option<&StageResult> {
        self.results.iter().find(|r| r.is_failure())
    }
}
