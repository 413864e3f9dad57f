//! Status enums shared by the orchestrator and the health aggregator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution status of a single stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not been issued yet.
    Pending,
    /// Stage is in flight.
    Running,
    /// Stage settled with a payload.
    Success,
    /// Stage settled with an error message.
    Error,
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a settled stage.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if the status indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Error)
    }
}

/// Whether a run executes the whole sequence or one stage in isolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Every stage in declaration order, halting on the first failure.
    Full,
    /// Exactly one stage.
    Single,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Single => write!(f, "single"),
        }
    }
}

/// Orchestrator state machine.
///
/// A full run moves `Idle -> Running(0) -> ... -> Running(n-1) -> Completed`,
/// or into `Halted(i)` on the first failure. A single-stage run is one
/// excursion `Idle -> Running(i) -> Completed | Failed(i)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum RunState {
    /// No run has started yet.
    Idle,
    /// The stage at this index is in flight.
    Running(usize),
    /// The last run settled with every stage successful.
    Completed,
    /// The last full run stopped at the stage at this index.
    Halted(usize),
    /// The last single-stage run failed at the stage at this index.
    Failed(usize),
}

impl Default for RunState {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running(i) => write!(f, "running({i})"),
            Self::Completed => write!(f, "completed"),
            Self::Halted(i) => write!(f, "halted({i})"),
            Self::Failed(i) => write!(f, "failed({i})"),
        }
    }
}

impl RunState {
    /// Returns true while a stage is in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running(_))
    }

    /// Returns the index of the active stage, if any.
    #[must_use]
    pub fn active_stage(&self) -> Option<usize> {
        match self {
            Self::Running(i) => Some(*i),
            _ => None,
        }
    }
}

/// Outcome of a single health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// The service answered its health endpoint successfully.
    Healthy,
    /// The service was unreachable, timed out, or answered with an error.
    Unhealthy,
    /// The probe could not reach a verdict.
    Error,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl HealthStatus {
    /// Returns true for a healthy probe.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Aggregate status over every probe in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeHealth {
    /// Every probe was healthy.
    Healthy,
    /// At least one probe was unhealthy or errored.
    Degraded,
}

impl fmt::Display for CompositeHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
        }
    }
}

impl CompositeHealth {
    /// Folds probe outcomes into a composite status.
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = HealthStatus>,
    {
        if statuses.into_iter().all(|s| s.is_healthy()) {
            Self::Healthy
        } else {
            Self::Degraded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_status_display() {
        assert_eq!(StageStatus::Pending.to_string(), "pending");
        assert_eq!(StageStatus::Running.to_string(), "running");
        assert_eq!(StageStatus::Success.to_string(), "success");
        assert_eq!(StageStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_stage_status_is_terminal() {
        assert!(StageStatus::Success.is_terminal());
        assert!(StageStatus::Error.is_terminal());
        assert!(!StageStatus::Pending.is_terminal());
        assert!(!StageStatus::Running.is_terminal());
    }

    #[test]
    fn test_run_state_active_stage() {
        assert_eq!(RunState::Running(2).active_stage(), Some(2));
        assert_eq!(RunState::Halted(2).active_stage(), None);
        assert_eq!(RunState::default(), RunState::Idle);
    }

    #[test]
    fn test_run_state_serialize() {
        let json = serde_json::to_value(RunState::Halted(1)).unwrap();
        assert_eq!(json, serde_json::json!({"state": "halted", "stage": 1}));

        let json = serde_json::to_value(RunState::Idle).unwrap();
        assert_eq!(json, serde_json::json!({"state": "idle"}));
    }

    #[test]
    fn test_composite_from_statuses() {
        assert_eq!(
            CompositeHealth::from_statuses([HealthStatus::Healthy, HealthStatus::Healthy]),
            CompositeHealth::Healthy
        );
        assert_eq!(
            CompositeHealth::from_statuses([HealthStatus::Healthy, HealthStatus::Error]),
            CompositeHealth::Degraded
        );
        assert_eq!(
            CompositeHealth::from_statuses([HealthStatus::Unhealthy]),
            CompositeHealth::Degraded
        );
        assert_eq!(CompositeHealth::from_statuses([]), CompositeHealth::Healthy);
    }

    #[test]
    fn test_health_status_serialize() {
        let json = serde_json::to_string(&HealthStatus::Unhealthy).unwrap();
        assert_eq!(json, r#""unhealthy""#);
    }
}
