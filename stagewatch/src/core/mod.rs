//! Core domain types shared across stagewatch:
//! - Stage, run and health status enums
//! - Lifecycle events

mod event;
mod status;

pub use event::WatchEvent;
pub use status::{CompositeHealth, HealthStatus, RunMode, RunState, StageStatus};
