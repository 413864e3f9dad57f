//! Testing utilities for code built on stagewatch.
//!
//! This module provides:
//! - A scripted gateway with per-path replies and call recording
//! - Sample stage lists and registries
//! - Assertions for run summaries and health snapshots

mod assertions;
mod fixtures;
mod gateway;

pub use assertions::{assert_run_completed, assert_run_halted_at, assert_service_status};
pub use fixtures::{
    healthy_services, sample_registry, sample_stages, stage_payload, succeeding_pipeline,
};
pub use gateway::{Method, RecordedCall, ScriptedGateway};
