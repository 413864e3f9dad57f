//! Per-service health records and the composite snapshot of one cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ServiceDescriptor;
use crate::core::{CompositeHealth, HealthStatus};

/// Outcome of probing one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    /// The probed service.
    pub service: ServiceDescriptor,
    /// Verdict of the probe.
    pub status: HealthStatus,
    /// Body returned by a successful probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Why the probe did not report healthy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the probe settled.
    pub checked_at: DateTime<Utc>,
}

impl ServiceHealth {
    /// A healthy record carrying the probe body.
    #[must_use]
    pub fn healthy(service: ServiceDescriptor, details: serde_json::Value) -> Self {
        Self {
            service,
            status: HealthStatus::Healthy,
            details: Some(details),
            error: None,
            checked_at: Utc::now(),
        }
    }

    /// A non-healthy record with an error string.
    #[must_use]
    pub fn failed(service: ServiceDescriptor, status: HealthStatus, error: impl Into<String>) -> Self {
        Self {
            service,
            status,
            details: None,
            error: Some(error.into()),
            checked_at: Utc::now(),
        }
    }

    /// Name of the probed service.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.service.name
    }

    /// Returns true if the service is healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status.is_healthy()
    }
}

/// The full result of one health cycle.
///
/// Built in one piece after every probe has settled and replaced wholesale on
/// the next cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// One record per registered service, in registry order.
    pub services: Vec<ServiceHealth>,
    /// Healthy iff every record is healthy.
    pub composite: CompositeHealth,
    /// Number of healthy records.
    pub healthy_count: usize,
    /// Number of records.
    pub total_count: usize,
    /// When the cycle completed.
    pub checked_at: DateTime<Utc>,
}

impl HealthSnapshot {
    /// Builds a snapshot from settled records.
    #[must_use]
    pub fn from_records(services: Vec<ServiceHealth>) -> Self {
        let composite = CompositeHealth::from_statuses(services.iter().map(|s| s.status));
        let healthy_count = services.iter().filter(|s| s.is_healthy()).count();
        Self {
            total_count: services.len(),
            healthy_count,
            composite,
            services,
            checked_at: Utc::now(),
        }
    }

    /// Returns the record for `name`.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceHealth> {
        self.services.iter().find(|s| s.name() == name)
    }

    /// Records that are not healthy.
    pub fn unhealthy(&self) -> impl Iterator<Item = &ServiceHealth> {
        self.services.iter().filter(|s| !s.is_healthy())
    }

    /// Returns true if the composite is healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.composite == CompositeHealth::Healthy
    }
}
