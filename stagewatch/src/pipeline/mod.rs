//! Pipeline declaration and execution.
//!
//! This module provides:
//! - Stage descriptors and run parameters
//! - Stage results, run records and summaries
//! - The sequential orchestrator and its elapsed counter

mod elapsed;
mod orchestrator;
mod result;
mod stage;


pub use elapsed::ElapsedCounter;
pub use orchestrator::PipelineOrchestrator;
pub use result::{PipelineRun, RunSummary, StagePayload, StageResult};
pub(crate) use stage::duration_ms;
pub use stage::{
    default_stages, sequence, validate_stages, RunParams, Stage, DEFAULT_COUNT,
    DEFAULT_STAGE_TIMEOUT, SYNC_STAGE_TIMEOUT,
};
