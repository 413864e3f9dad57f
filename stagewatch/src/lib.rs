//! # Stagewatch
//!
//! Sequential pipeline orchestration and service health aggregation for a
//! remote processing gateway.
//!
//! Stagewatch provides:
//!
//! - **Pipeline orchestration**: run an ordered list of remote stages one at a
//!   time, halting at the first failure and recording every outcome
//! - **Health aggregation**: probe every dependent service concurrently and
//!   fold the results into a composite healthy/degraded view, on demand or on
//!   a fixed interval
//! - **Result caching**: short-TTL memoization of aggregate reads, cleared by
//!   every successful mutation
//! - **Event-driven observability**: lifecycle events and structured logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagewatch::prelude::*;
//!
//! let config = StagewatchConfig::default().with_env_overrides()?;
//! let gateway: Arc<dyn Gateway> = Arc::new(HttpGateway::new(&config.gateway)?);
//!
//! let client = Arc::new(GatewayClient::from_config(gateway.clone(), &config));
//! let orchestrator = PipelineOrchestrator::new(client);
//! let summary = orchestrator
//!     .run_full_sequence(&config.stages, &RunParams::with_count(config.default_count))
//!     .await?;
//!
//! let aggregator = HealthAggregator::new(gateway).with_probe_timeout(config.probe_timeout());
//! let monitor = HealthMonitor::activate(
//!     aggregator,
//!     config.services.clone(),
//!     config.health_poll_interval(),
//!     Arc::new(LoggingEventSink::default()),
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cache;
pub mod cancellation;
pub mod client;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod health;
pub mod observability;
pub mod pipeline;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::ResultCache;
    pub use crate::client::{CachedRead, GatewayClient};
    pub use crate::config::{GatewayConfig, StagewatchConfig};
    pub use crate::core::{
        CompositeHealth, HealthStatus, RunMode, RunState, StageStatus, WatchEvent,
    };
    pub use crate::errors::{ConfigError, GatewayError, OrchestratorError, StagewatchError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    #[cfg(feature = "http")]
    pub use crate::gateway::HttpGateway;
    pub use crate::gateway::Gateway;
    pub use crate::health::{
        HealthAggregator, HealthMonitor, HealthMonitorHandle, HealthSnapshot, ServiceDescriptor,
        ServiceHealth, ServiceRegistry,
    };
    pub use crate::observability::{init_logging, LogFormat};
    pub use crate::pipeline::{
        PipelineOrchestrator, PipelineRun, RunParams, RunSummary, Stage, StageResult,
    };
    pub use std::sync::Arc;
}
