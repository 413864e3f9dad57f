//! Composite health of the services behind the gateway.
//!
//! [`HealthAggregator::check_all`] probes a [`ServiceRegistry`] once, all
//! services concurrently, and returns a [`HealthSnapshot`]. [`HealthMonitor`]
//! repeats that on a fixed interval and publishes each snapshot whole.

mod aggregator;
mod monitor;
mod registry;
mod snapshot;

pub use aggregator::{HealthAggregator, DEFAULT_PROBE_TIMEOUT, UNREACHABLE_MESSAGE};
pub use monitor::{HealthMonitor, HealthMonitorHandle, DEFAULT_HEALTH_INTERVAL};
pub use registry::{default_registry, ServiceDescriptor, ServiceRegistry};
pub use snapshot::{HealthSnapshot, ServiceHealth};
