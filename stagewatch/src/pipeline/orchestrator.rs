//! Sequential stage execution with halt-on-first-failure.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{ElapsedCounter, PipelineRun, RunParams, RunSummary, Stage, StageResult};
use crate::client::GatewayClient;
use crate::core::{RunMode, RunState, WatchEvent};
use crate::errors::OrchestratorError;
use crate::events::{default_sink, EventSink};

/// Runs a declared stage list against the gateway, one stage at a time.
///
/// At most one run (full or single-stage) is active per orchestrator. Stage
/// failures are recorded, never raised: the only errors returned are for
/// requests rejected before any stage is invoked.
pub struct PipelineOrchestrator {
    client: Arc<GatewayClient>,
    sink: Arc<dyn EventSink>,
    state: RwLock<RunState>,
    elapsed: ElapsedCounter,
    last_full_run: RwLock<Option<PipelineRun>>,
    single_runs: RwLock<HashMap<usize, PipelineRun>>,
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("state", &*self.state.read())
            .field("elapsed_seconds", &self.elapsed.seconds())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Full,
    Single(usize),
}

impl PipelineOrchestrator {
    /// Creates an idle orchestrator that discards events.
    #[must_use]
    pub fn new(client: Arc<GatewayClient>) -> Self {
        Self {
            client,
            sink: default_sink(),
            state: RwLock::new(RunState::Idle),
            elapsed: ElapsedCounter::new(),
            last_full_run: RwLock::new(None),
            single_runs: RwLock::new(HashMap::new()),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The client stages are executed through.
    #[must_use]
    pub fn client(&self) -> &Arc<GatewayClient> {
        &self.client
    }

    /// Current position in the run state machine.
    #[must_use]
    pub fn state(&self) -> RunState {
        *self.state.read()
    }

    /// Index of the stage currently executing.
    #[must_use]
    pub fn active_stage(&self) -> Option<usize> {
        self.state().active_stage()
    }

    /// Returns true while a run is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Whole seconds since the active run began; 0 when idle.
    #[must_use]
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed.seconds()
    }

    /// The latest full-sequence run, including one still in progress.
    #[must_use]
    pub fn last_full_run(&self) -> Option<PipelineRun> {
        self.last_full_run.read().clone()
    }

    /// The latest isolated run of stage `index`.
    #[must_use]
    pub fn last_single_stage(&self, index: usize) -> Option<PipelineRun> {
        self.single_runs.read().get(&index).cloned()
    }

    /// Runs every stage in order, stopping at the first failure.
    ///
    /// Stage `i + 1` is issued only after stage `i` has settled successfully.
    pub async fn run_full_sequence(
        &self,
        stages: &[Stage],
        params: &RunParams,
    ) -> Result<RunSummary, OrchestratorError> {
        let total = stages.len();
        if total == 0 {
            let mut run = PipelineRun::begin(RunMode::Full, 0);
            self.claim(&run, 0)?;
            run.finish(RunState::Completed);
            *self.last_full_run.write() = Some(run.clone());
            *self.state.write() = RunState::Completed;
            info!(run_id = %run.run_id, "Empty pipeline completed");
            return Ok(run.summary());
        }

        let run = PipelineRun::begin(RunMode::Full, total);
        let run_id = run.run_id;
        self.claim(&run, 0)?;
        *self.last_full_run.write() = Some(run);
        let mut guard = ActiveRun::new(self);

        info!(run_id = %run_id, total, count = params.count, "Pipeline run started");
        self.sink
            .emit(WatchEvent::pipeline_started(run_id, RunMode::Full, total))
            .await;

        let mut final_state = RunState::Completed;
        for (index, stage) in stages.iter().enumerate() {
            let result = self.execute(run_id, stage, index, params).await;
            let failed = result.is_failure().then(|| result.error.clone().unwrap_or_default());
            self.record(Slot::Full, result);

            if let Some(error) = failed {
                final_state = RunState::Halted(index);
                warn!(run_id = %run_id, stage = %stage.label, index, "Pipeline halted");
                self.sink
                    .emit(WatchEvent::pipeline_halted(run_id, &stage.label, &error))
                    .await;
                break;
            }
        }

        let summary = self.finish(Slot::Full, final_state);
        guard.disarm();

        if final_state == RunState::Completed {
            info!(run_id = %run_id, completed = summary.completed_count, total, "Pipeline run completed");
            self.sink
                .emit(WatchEvent::pipeline_completed(run_id, summary.completed_count, total))
                .await;
        }
        Ok(summary)
    }

    /// Runs stage `index` on its own.
    ///
    /// The resulting run holds only that stage's outcome and is stored apart
    /// from the full-sequence history.
    pub async fn run_single_stage(
        &self,
        stages: &[Stage],
        index: usize,
        params: &RunParams,
    ) -> Result<RunSummary, OrchestratorError> {
        let stage = stages
            .get(index)
            .ok_or(OrchestratorError::StageIndexOutOfRange {
                index,
                total: stages.len(),
            })?;

        let run = PipelineRun::begin(RunMode::Single, 1);
        let run_id = run.run_id;
        self.claim(&run, index)?;
        self.single_runs.write().insert(index, run);
        let mut guard = ActiveRun::new(self);

        info!(run_id = %run_id, stage = %stage.label, index, "Single stage run started");
        self.sink
            .emit(WatchEvent::pipeline_started(run_id, RunMode::Single, 1))
            .await;

        let result = self.execute(run_id, stage, index, params).await;
        let failure = result.error.clone().filter(|_| result.is_failure());
        self.record(Slot::Single(index), result);

        let final_state = if failure.is_some() {
            RunState::Failed(index)
        } else {
            RunState::Completed
        };
        let summary = self.finish(Slot::Single(index), final_state);
        guard.disarm();

        match failure {
            Some(error) => {
                self.sink
                    .emit(WatchEvent::pipeline_halted(run_id, &stage.label, &error))
                    .await;
            }
            None => {
                self.sink
                    .emit(WatchEvent::pipeline_completed(run_id, summary.completed_count, 1))
                    .await;
            }
        }
        Ok(summary)
    }

    // Moves to Running(first) atomically, or rejects if a run is active.
    fn claim(&self, run: &PipelineRun, first: usize) -> Result<(), OrchestratorError> {
        let mut state = self.state.write();
        if let RunState::Running(active_stage) = *state {
            warn!(run_id = %run.run_id, active_stage, "Rejected run: orchestrator busy");
            return Err(OrchestratorError::AlreadyRunning { active_stage });
        }
        if run.total > 0 {
            *state = RunState::Running(first);
            self.elapsed.start();
        }
        Ok(())
    }

    async fn execute(
        &self,
        run_id: Uuid,
        stage: &Stage,
        index: usize,
        params: &RunParams,
    ) -> StageResult {
        *self.state.write() = RunState::Running(index);
        self.sink
            .emit(WatchEvent::stage_started(run_id, &stage.label, index))
            .await;

        let started = StageResult::started(stage, index);
        match self.client.execute_stage(stage, params).await {
            Ok(payload) => {
                let result = started.succeed(payload);
                let duration_ms = result.duration_ms().unwrap_or_default();
                info!(run_id = %run_id, stage = %stage.label, duration_ms, "Stage completed");
                self.sink
                    .emit(WatchEvent::stage_completed(run_id, &stage.label, duration_ms))
                    .await;
                result
            }
            Err(error) => {
                let message = error.user_message();
                warn!(run_id = %run_id, stage = %stage.label, error = %error, "Stage failed");
                self.sink
                    .emit(WatchEvent::stage_failed(run_id, &stage.label, &message))
                    .await;
                started.fail(message)
            }
        }
    }

    fn record(&self, slot: Slot, result: StageResult) {
        match slot {
            Slot::Full => {
                if let Some(run) = self.last_full_run.write().as_mut() {
                    run.record(result);
                }
            }
            Slot::Single(index) => {
                if let Some(run) = self.single_runs.write().get_mut(&index) {
                    run.record(result);
                }
            }
        }
    }

    fn finish(&self, slot: Slot, final_state: RunState) -> RunSummary {
        let summary = match slot {
            Slot::Full => self.last_full_run.write().as_mut().map(|run| {
                run.finish(final_state);
                run.summary()
            }),
            Slot::Single(index) => self.single_runs.write().get_mut(&index).map(|run| {
                run.finish(final_state);
                run.summary()
            }),
        };
        self.elapsed.stop();
        *self.state.write() = final_state;

        summary.unwrap_or_else(|| {
            let mut run = PipelineRun::begin(
                match slot {
                    Slot::Full => RunMode::Full,
                    Slot::Single(_) => RunMode::Single,
                },
                0,
            );
            run.finish(final_state);
            run.summary()
        })
    }
}

/// Returns the orchestrator to idle if a run future is dropped mid-flight.
struct ActiveRun<'a> {
    orchestrator: &'a PipelineOrchestrator,
    armed: bool,
}

impl<'a> ActiveRun<'a> {
    fn new(orchestrator: &'a PipelineOrchestrator) -> Self {
        Self {
            orchestrator,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Run abandoned before settling; returning to idle");
            self.orchestrator.elapsed.stop();
            *self.orchestrator.state.write() = RunState::Idle;
        }
    }
}
