//! The static list of services probed each health cycle.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::ConfigError;

/// One dependent service and where its health endpoint lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Display name, unique within a registry.
    pub name: String,
    /// Gateway path probed with `GET`.
    pub health_path: String,
    /// Port the service listens on behind the gateway, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl ServiceDescriptor {
    /// Creates a descriptor without a port.
    #[must_use]
    pub fn new(name: impl Into<String>, health_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            health_path: health_path.into(),
            port: None,
        }
    }

    /// Sets the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

/// Ordered service registry. Probe results are reported in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceRegistry {
    services: Vec<ServiceDescriptor>,
}

impl ServiceRegistry {
    /// Creates a registry from descriptors, keeping their order.
    #[must_use]
    pub fn new(services: Vec<ServiceDescriptor>) -> Self {
        Self { services }
    }

    /// Appends a descriptor.
    #[must_use]
    pub fn with_service(mut self, service: ServiceDescriptor) -> Self {
        self.services.push(service);
        self
    }

    /// Iterates descriptors in registry order.
    pub fn iter(&self) -> std::slice::Iter<'_, ServiceDescriptor> {
        self.services.iter()
    }

    /// Returns the descriptor named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns true if no service is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Checks that names and paths are present and names are unique.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (i, service) in self.services.iter().enumerate() {
            if service.name.trim().is_empty() {
                return Err(ConfigError::invalid(format!("services[{i}].name"), "must not be empty"));
            }
            if service.health_path.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("services[{i}].health_path"),
                    "must not be empty",
                ));
            }
            if !seen.insert(service.name.as_str()) {
                return Err(ConfigError::invalid(
                    format!("services[{i}].name"),
                    format!("duplicate service name '{}'", service.name),
                ));
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ServiceRegistry {
    type Item = &'a ServiceDescriptor;
    type IntoIter = std::slice::Iter<'a, ServiceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.services.iter()
    }
}

impl FromIterator<ServiceDescriptor> for ServiceRegistry {
    fn from_iter<I: IntoIterator<Item = ServiceDescriptor>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// The seven services behind the processing gateway.
#[must_use]
pub fn default_registry() -> ServiceRegistry {
    ServiceRegistry::new(vec![
        ServiceDescriptor::new("ProxyFHIR", "/api/v1/fhir/health").with_port(8081),
        ServiceDescriptor::new("DeID", "/api/v1/deid/health").with_port(5000),
        ServiceDescriptor::new("Featurizer", "/api/v1/features/health").with_port(5001),
        ServiceDescriptor::new("ML-Predictor", "/api/v1/predictions/health").with_port(5002),
        ServiceDescriptor::new("ScoreAPI", "/api/v1/scores/health").with_port(5003),
        ServiceDescriptor::new("AuditFairness", "/api/v1/audit/health").with_port(5004),
        ServiceDescriptor::new("API Gateway", "/health").with_port(8085),
    ])
}
