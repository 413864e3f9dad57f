//! Periodic health refresh with deterministic teardown.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::{HealthAggregator, HealthSnapshot, ServiceRegistry};
use crate::cancellation::CancellationToken;
use crate::core::WatchEvent;
use crate::events::EventSink;
use crate::pipeline::duration_ms;

/// Interval between health cycles.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);

/// Shortest interval the monitor will tick at.
pub const MIN_HEALTH_INTERVAL: Duration = Duration::from_millis(1);

type SnapshotSender = watch::Sender<Option<Arc<HealthSnapshot>>>;

/// Starts periodic health refreshes.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthMonitor;

impl HealthMonitor {
    /// Runs one check immediately, then one every `interval`, until the
    /// returned handle is deactivated or dropped.
    ///
    /// An interval below [`MIN_HEALTH_INTERVAL`] is raised to it.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn activate(
        aggregator: HealthAggregator,
        registry: ServiceRegistry,
        interval: Duration,
        sink: Arc<dyn EventSink>,
    ) -> HealthMonitorHandle {
        let (sender, _) = watch::channel(None);
        let shared = Arc::new(Shared {
            sender,
            active: Mutex::new(true),
            cycles: AtomicU64::new(0),
            sink,
        });
        let token = Arc::new(CancellationToken::new());

        if interval < MIN_HEALTH_INTERVAL {
            warn!(
                requested_ms = duration_ms(interval),
                "Health interval too short, using minimum"
            );
        }
        let interval = interval.max(MIN_HEALTH_INTERVAL);

        info!(
            services = registry.len(),
            interval_ms = duration_ms(interval),
            "Health monitor activated"
        );

        let task = tokio::spawn(refresh_loop(
            aggregator,
            registry,
            interval,
            Arc::clone(&shared),
            Arc::clone(&token),
        ));

        HealthMonitorHandle {
            shared,
            token,
            task: Some(task),
        }
    }
}

struct Shared {
    sender: SnapshotSender,
    // False once deactivated; publication happens under this lock.
    active: Mutex<bool>,
    cycles: AtomicU64,
    sink: Arc<dyn EventSink>,
}

impl Shared {
    fn publish(&self, snapshot: HealthSnapshot) -> bool {
        let active = self.active.lock();
        if !*active {
            return false;
        }
        let event = WatchEvent::health_checked(
            snapshot.composite,
            snapshot.healthy_count,
            snapshot.total_count,
        );
        self.sender.send_replace(Some(Arc::new(snapshot)));
        self.cycles.fetch_add(1, Ordering::SeqCst);
        self.sink.try_emit(event);
        true
    }
}

async fn refresh_loop(
    aggregator: HealthAggregator,
    registry: ServiceRegistry,
    interval: Duration,
    shared: Arc<Shared>,
    token: Arc<CancellationToken>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let snapshot = tokio::select! {
            biased;
            () = token.cancelled() => break,
            snapshot = aggregator.check_all(&registry) => snapshot,
        };

        if !shared.publish(snapshot) {
            break;
        }
    }

    debug!("Health refresh loop stopped");
}

/// Owner of a running health monitor.
///
/// Dropping the handle deactivates the monitor.
pub struct HealthMonitorHandle {
    shared: Arc<Shared>,
    token: Arc<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for HealthMonitorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitorHandle")
            .field("active", &self.is_active())
            .field("cycles", &self.cycles())
            .finish_non_exhaustive()
    }
}

impl HealthMonitorHandle {
    /// The most recently published snapshot, if any cycle has completed.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<HealthSnapshot>> {
        self.shared.sender.borrow().clone()
    }

    /// A receiver that observes every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<HealthSnapshot>>> {
        self.shared.sender.subscribe()
    }

    /// Number of published cycles.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.shared.cycles.load(Ordering::SeqCst)
    }

    /// Returns true until [`deactivate`](Self::deactivate) is called.
    #[must_use]
    pub fn is_active(&self) -> bool {
        *self.shared.active.lock()
    }

    /// Stops the refresh task.
    ///
    /// Once this returns no snapshot is published and no tick fires. A cycle
    /// already in flight is aborted along with its probes.
    pub fn deactivate(&mut self) {
        {
            let mut active = self.shared.active.lock();
            if !*active {
                return;
            }
            *active = false;
        }
        self.token.cancel("health monitor deactivated");
        if let Some(task) = self.task.take() {
            task.abort();
        }
        info!(cycles = self.cycles(), "Health monitor deactivated");
    }
}

impl Drop for HealthMonitorHandle {
    fn drop(&mut self) {
        self.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CompositeHealth;
    use crate::events::CollectingEventSink;
    use crate::health::ServiceDescriptor;
    use crate::testing::{healthy_services, sample_registry, ScriptedGateway};
    use serde_json::json;

    fn setup() -> (Arc<ScriptedGateway>, HealthAggregator, ServiceRegistry) {
        let registry = sample_registry(2);
        let gateway = Arc::new(healthy_services(&registry));
        let aggregator = HealthAggregator::new(gateway.clone());
        (gateway, aggregator, registry)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_checks_on_activation_then_each_interval() {
        let (gateway, aggregator, registry) = setup();
        let sink = Arc::new(CollectingEventSink::new());
        let handle = HealthMonitor::activate(
            aggregator,
            registry,
            DEFAULT_HEALTH_INTERVAL,
            sink.clone(),
        );
        let mut updates = handle.subscribe();

        updates.changed().await.unwrap();
        let first = handle.latest().unwrap();
        assert_eq!(first.composite, CompositeHealth::Healthy);
        assert_eq!(handle.cycles(), 1);
        assert_eq!(gateway.calls("/svc-0/health"), 1);

        tokio::time::advance(Duration::from_secs(29)).await;
        settle().await;
        assert_eq!(handle.cycles(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        updates.changed().await.unwrap();
        assert_eq!(handle.cycles(), 2);
        assert_eq!(gateway.calls("/svc-1/health"), 2);
        assert_eq!(sink.events_of_type("health.checked").len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_published_after_deactivate() {
        let (gateway, aggregator, registry) = setup();
        let mut handle = HealthMonitor::activate(
            aggregator,
            registry,
            DEFAULT_HEALTH_INTERVAL,
            crate::events::default_sink(),
        );
        let mut updates = handle.subscribe();
        updates.changed().await.unwrap();

        handle.deactivate();
        assert!(!handle.is_active());

        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;

        assert_eq!(handle.cycles(), 1);
        assert_eq!(gateway.calls("/svc-0/health"), 1);
        handle.deactivate();
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivate_discards_in_flight_cycle() {
        let gateway = Arc::new(ScriptedGateway::new().respond_after(
            "/slow/health",
            Duration::from_secs(3),
            Ok(json!({})),
        ));
        let registry = ServiceRegistry::new(vec![ServiceDescriptor::new("slow", "/slow/health")]);
        let mut handle = HealthMonitor::activate(
            HealthAggregator::new(gateway.clone()),
            registry,
            DEFAULT_HEALTH_INTERVAL,
            crate::events::default_sink(),
        );

        settle().await;
        assert_eq!(gateway.calls("/slow/health"), 1);

        handle.deactivate();
        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;

        assert!(handle.latest().is_none());
        assert_eq!(handle.cycles(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_deactivates() {
        let (gateway, aggregator, registry) = setup();
        let handle = HealthMonitor::activate(
            aggregator,
            registry,
            Duration::from_secs(1),
            crate::events::default_sink(),
        );
        let mut updates = handle.subscribe();
        updates.changed().await.unwrap();

        drop(handle);
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;

        assert_eq!(gateway.calls("/svc-0/health"), 1);
        assert!(!matches!(updates.has_changed(), Ok(true)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let (gateway, aggregator, registry) = setup();
        let handle = HealthMonitor::activate(
            aggregator,
            registry,
            Duration::ZERO,
            crate::events::default_sink(),
        );
        let mut updates = handle.subscribe();

        for _ in 0..3 {
            tokio::time::timeout(Duration::from_secs(1), updates.changed())
                .await
                .expect("monitor should keep publishing")
                .unwrap();
        }

        assert!(handle.is_active());
        assert!(handle.cycles() >= 3);
        assert!(gateway.calls("/svc-0/health") >= 3);
    }
}
