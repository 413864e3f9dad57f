//! Assertions for run summaries and health snapshots.

use crate::core::{HealthStatus, RunState};
use crate::health::HealthSnapshot;
use crate::pipeline::RunSummary;

/// Asserts that every stage of the run succeeded.
pub fn assert_run_completed(summary: &RunSummary) {
    assert!(
        summary.is_complete() && summary.state == RunState::Completed,
        "Expected completed run, got {:?} with {}/{} stages",
        summary.state,
        summary.completed_count,
        summary.total
    );
}

/// Asserts that the run halted on the stage labelled `label` and nothing ran after it.
pub fn assert_run_halted_at(summary: &RunSummary, label: &str) {
    let last = summary.results.last();
    assert!(
        matches!(summary.state, RunState::Halted(_)),
        "Expected halted run, got {:?}",
        summary.state
    );
    assert_eq!(
        last.map(|r| r.stage.as_str()),
        Some(label),
        "Expected run to stop at '{}', results: {:?}",
        label,
        summary.results.iter().map(|r| &r.stage).collect::<Vec<_>>()
    );
    assert!(
        last.is_some_and(crate::pipeline::StageResult::is_failure),
        "Expected '{label}' to have failed"
    );
}

/// Asserts the status recorded for `service`.
pub fn assert_service_status(snapshot: &HealthSnapshot, service: &str, expected: HealthStatus) {
    let actual = snapshot.service(service).map(|s| s.status);
    assert_eq!(
        actual,
        Some(expected),
        "Expected {service} to be {expected}, got {actual:?}"
    );
}
