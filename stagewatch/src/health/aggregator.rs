//! Concurrent fan-out of health probes.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{HealthSnapshot, ServiceDescriptor, ServiceHealth, ServiceRegistry};
use crate::core::HealthStatus;
use crate::errors::GatewayError;
use crate::gateway::Gateway;
use crate::utils::bounded_call;

/// Budget for one probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Message recorded for a service the gateway could not reach.
pub const UNREACHABLE_MESSAGE: &str = "Service not reachable via Gateway";

/// Probes every registered service and folds the outcomes into a snapshot.
#[derive(Clone)]
pub struct HealthAggregator {
    gateway: Arc<dyn Gateway>,
    probe_timeout: Duration,
}

impl std::fmt::Debug for HealthAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthAggregator")
            .field("probe_timeout", &self.probe_timeout)
            .finish_non_exhaustive()
    }
}

impl HealthAggregator {
    /// Creates an aggregator with the default probe budget.
    #[must_use]
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Sets the probe budget.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Returns the probe budget.
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Probes every service concurrently and waits for all of them.
    ///
    /// Never fails: each probe error becomes a record. Records come back in
    /// registry order and the call takes as long as the slowest probe.
    pub async fn check_all(&self, registry: &ServiceRegistry) -> HealthSnapshot {
        let probes = registry.iter().map(|service| self.probe(service));
        let records = join_all(probes).await;
        let snapshot = HealthSnapshot::from_records(records);

        info!(
            composite = %snapshot.composite,
            healthy = snapshot.healthy_count,
            total = snapshot.total_count,
            "Health check completed"
        );
        snapshot
    }

    /// Probes one service.
    pub async fn probe(&self, service: &ServiceDescriptor) -> ServiceHealth {
        let outcome = bounded_call(
            self.probe_timeout,
            self.gateway.get(&service.health_path, self.probe_timeout),
        )
        .await;

        match outcome {
            Ok(details) => {
                debug!(service = %service.name, "Probe healthy");
                ServiceHealth::healthy(service.clone(), details)
            }
            Err(error) => {
                let (status, message) = classify(&error);
                warn!(service = %service.name, status = %status, error = %message, "Probe failed");
                ServiceHealth::failed(service.clone(), status, message)
            }
        }
    }
}

/// Maps a probe failure to a verdict and the message shown for it.
fn classify(error: &GatewayError) -> (HealthStatus, String) {
    match error {
        GatewayError::NetworkUnreachable { .. } => {
            (HealthStatus::Unhealthy, UNREACHABLE_MESSAGE.to_string())
        }
        GatewayError::Timeout { .. } => (HealthStatus::Unhealthy, error.to_string()),
        GatewayError::Remote { message, .. } => (HealthStatus::Unhealthy, message.clone()),
        GatewayError::MalformedResponse { message } => (HealthStatus::Error, message.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CompositeHealth;
    use crate::gateway::MockGateway;
    use crate::health::default_registry;
    use crate::testing::{assert_service_status, healthy_services, sample_registry, ScriptedGateway};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn registry(names: &[&str]) -> ServiceRegistry {
        names
            .iter()
            .map(|name| ServiceDescriptor::new(*name, format!("/{name}/health")))
            .collect()
    }

    #[tokio::test]
    async fn test_two_of_five_unhealthy_is_degraded() {
        let gateway = ScriptedGateway::new()
            .respond("/a/health", Ok(json!({"status": "UP"})))
            .respond("/b/health", Err(GatewayError::unreachable("connection refused")))
            .respond("/c/health", Ok(json!({"status": "UP"})))
            .respond("/d/health", Err(GatewayError::remote(503, "Service Unavailable")))
            .respond("/e/health", Ok(json!({"status": "UP"})));

        let aggregator = HealthAggregator::new(Arc::new(gateway));
        let snapshot = aggregator.check_all(&registry(&["a", "b", "c", "d", "e"])).await;

        assert_eq!(snapshot.healthy_count, 3);
        assert_eq!(snapshot.total_count, 5);
        assert_eq!(snapshot.composite, CompositeHealth::Degraded);
        assert_service_status(&snapshot, "b", HealthStatus::Unhealthy);
        assert_service_status(&snapshot, "c", HealthStatus::Healthy);
        assert_eq!(
            snapshot.service("b").unwrap().error.as_deref(),
            Some(UNREACHABLE_MESSAGE)
        );
        assert_eq!(
            snapshot.service("d").unwrap().error.as_deref(),
            Some("Service Unavailable")
        );
        assert_eq!(snapshot.service("a").unwrap().details, Some(json!({"status": "UP"})));
    }

    #[tokio::test]
    async fn test_all_failing_still_resolves_in_registry_order() {
        let aggregator = HealthAggregator::new(Arc::new(ScriptedGateway::new()));
        let registry = default_registry();

        let snapshot = aggregator.check_all(&registry).await;

        let names: Vec<_> = snapshot.services.iter().map(ServiceHealth::name).collect();
        let expected: Vec<_> = registry.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, expected);
        assert_eq!(snapshot.healthy_count, 0);
        assert!(snapshot
            .services
            .iter()
            .all(|s| s.status == HealthStatus::Unhealthy));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probes_run_concurrently() {
        let gateway = ScriptedGateway::new()
            .respond_after("/a/health", Duration::from_secs(4), Ok(json!({})))
            .respond_after("/b/health", Duration::from_secs(4), Ok(json!({})))
            .respond_after("/c/health", Duration::from_secs(60), Ok(json!({})));

        let aggregator = HealthAggregator::new(Arc::new(gateway));
        let started = tokio::time::Instant::now();
        let snapshot = aggregator.check_all(&registry(&["a", "b", "c"])).await;

        assert!(started.elapsed() <= DEFAULT_PROBE_TIMEOUT);
        assert_eq!(snapshot.healthy_count, 2);
        assert_eq!(
            snapshot.service("c").unwrap().error.as_deref(),
            Some("Timed out after 5000ms")
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_error_status() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_get()
            .withf(|path, timeout| path == "/x/health" && *timeout == DEFAULT_PROBE_TIMEOUT)
            .times(1)
            .returning(|_, _| Err(GatewayError::malformed("expected value at line 1")));

        let aggregator = HealthAggregator::new(Arc::new(gateway));
        let snapshot = aggregator.check_all(&registry(&["x"])).await;

        assert_eq!(snapshot.services[0].status, HealthStatus::Error);
        assert_eq!(snapshot.composite, CompositeHealth::Degraded);
    }

    #[tokio::test]
    async fn test_all_services_up_is_healthy() {
        let registry = sample_registry(4);
        let aggregator = HealthAggregator::new(Arc::new(healthy_services(&registry)));

        let snapshot = aggregator.check_all(&registry).await;

        assert!(snapshot.is_healthy());
        assert_eq!(snapshot.healthy_count, 4);
        assert!(snapshot.unhealthy().next().is_none());
        assert_service_status(&snapshot, "svc-3", HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_empty_registry_is_healthy() {
        let aggregator = HealthAggregator::new(Arc::new(ScriptedGateway::new()));
        let snapshot = aggregator.check_all(&ServiceRegistry::default()).await;
        assert!(snapshot.is_healthy());
    }
}
