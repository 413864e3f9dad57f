//! Stage descriptors and run parameters.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::gateway::QueryParam;

/// Budget for the bulk sync stage.
pub const SYNC_STAGE_TIMEOUT: Duration = Duration::from_secs(600);

/// Budget for every other stage.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(120);

/// Patient count used when the caller does not supply one.
pub const DEFAULT_COUNT: u32 = 100;

/// One step of the pipeline: a labelled remote operation with its own budget.
///
/// Stages are immutable once configured. `ordinal` is the declaration
/// position; use [`sequence`] to assign it for a whole list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Display label, unique within a pipeline.
    pub label: String,
    /// Gateway path the stage POSTs to.
    pub endpoint: String,
    /// Per-stage budget in milliseconds.
    #[serde(default = "default_stage_timeout_ms")]
    pub timeout_ms: u64,
    /// Position in the declared sequence.
    #[serde(default)]
    pub ordinal: usize,
    /// Whether the run's `count` parameter is sent as `?count=N`.
    #[serde(default)]
    pub count_param: bool,
    /// Whether success changes server-side state (and so invalidates cached reads).
    #[serde(default = "default_mutating")]
    pub mutating: bool,
}

fn default_stage_timeout_ms() -> u64 {
    duration_ms(DEFAULT_STAGE_TIMEOUT)
}

fn default_mutating() -> bool {
    true
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Stage {
    /// Creates a mutating stage with the default budget.
    #[must_use]
    pub fn new(label: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            endpoint: endpoint.into(),
            timeout_ms: default_stage_timeout_ms(),
            ordinal: 0,
            count_param: false,
            mutating: true,
        }
    }

    /// Sets the budget.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = duration_ms(timeout);
        self
    }

    /// Sends the run's count parameter with this stage.
    #[must_use]
    pub fn with_count_param(mut self) -> Self {
        self.count_param = true;
        self
    }

    /// Marks the stage as read-only: success does not clear cached reads.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.mutating = false;
        self
    }

    /// Returns the budget as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Builds the query string for a run with `params`.
    #[must_use]
    pub fn query(&self, params: &RunParams) -> Vec<QueryParam> {
        if self.count_param {
            vec![("count".to_string(), params.count.to_string())]
        } else {
            Vec::new()
        }
    }

    /// Validates the descriptor.
    pub fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.label.trim().is_empty() {
            return Err(ConfigError::invalid(format!("{field}.label"), "must not be empty"));
        }
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::invalid(format!("{field}.endpoint"), "must not be empty"));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::invalid(format!("{field}.timeout_ms"), "must be positive"));
        }
        Ok(())
    }
}

/// Assigns declaration ordinals to a list of stages.
#[must_use]
pub fn sequence(stages: impl IntoIterator<Item = Stage>) -> Vec<Stage> {
    stages
        .into_iter()
        .enumerate()
        .map(|(ordinal, mut stage)| {
            stage.ordinal = ordinal;
            stage
        })
        .collect()
}

/// Validates a stage list: every descriptor is well-formed and labels are unique.
pub fn validate_stages(stages: &[Stage]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for (i, stage) in stages.iter().enumerate() {
        let field = format!("stages[{i}]");
        stage.validate(&field)?;
        if !seen.insert(stage.label.as_str()) {
            return Err(ConfigError::invalid(
                format!("{field}.label"),
                format!("duplicate stage label '{}'", stage.label),
            ));
        }
    }
    Ok(())
}

/// The standard four-stage pipeline: sync, anonymize, extract, predict.
#[must_use]
pub fn default_stages() -> Vec<Stage> {
    sequence([
        Stage::new("Sync FHIR", "/api/v1/fhir/sync/bulk")
            .with_timeout(SYNC_STAGE_TIMEOUT)
            .with_count_param(),
        Stage::new("Anonymize", "/api/v1/deid/anonymize/all"),
        Stage::new("Extract Features", "/api/v1/features/extract/all"),
        Stage::new("Predict Risks", "/api/v1/predictions/predict/all"),
    ])
}

/// Parameters substituted into stage calls for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParams {
    /// Number of records the sync stage should pull.
    pub count: u32,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            count: DEFAULT_COUNT,
        }
    }
}

impl RunParams {
    /// Creates parameters with the given count.
    #[must_use]
    pub fn with_count(count: u32) -> Self {
        Self { count }
    }
}
