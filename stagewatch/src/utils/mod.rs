//! Small runtime helpers shared by the orchestrator and the aggregator.

pub mod timeout;

pub use timeout::{bounded_call, run_with_timeout, TimedResult};
