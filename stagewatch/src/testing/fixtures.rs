//! Ready-made stage lists, registries and gateways.

use serde_json::json;

use super::ScriptedGateway;
use crate::health::{ServiceDescriptor, ServiceRegistry};
use crate::pipeline::{default_stages, Stage};

/// The default four-stage pipeline.
#[must_use]
pub fn sample_stages() -> Vec<Stage> {
    default_stages()
}

/// A registry of `n` services named `svc-0` .. `svc-{n-1}`.
#[must_use]
pub fn sample_registry(n: usize) -> ServiceRegistry {
    (0..n)
        .map(|i| ServiceDescriptor::new(format!("svc-{i}"), format!("/svc-{i}/health")))
        .collect()
}

/// A typical success body for each default stage, keyed by endpoint.
#[must_use]
pub fn stage_payload(endpoint: &str) -> serde_json::Value {
    match endpoint {
        "/api/v1/fhir/sync/bulk" => json!({"synced": 100, "failed": 0, "totalResources": 4200}),
        "/api/v1/deid/anonymize/all" => json!({"anonymized": 100}),
        "/api/v1/features/extract/all" => json!({"extracted": 100, "errors": 0}),
        "/api/v1/predictions/predict/all" => json!({"predicted": 100, "errors": 0}),
        _ => json!({}),
    }
}

/// A gateway where every stage in `stages` succeeds.
#[must_use]
pub fn succeeding_pipeline(stages: &[Stage]) -> ScriptedGateway {
    stages.iter().fold(ScriptedGateway::new(), |gateway, stage| {
        gateway.respond(stage.endpoint.clone(), Ok(stage_payload(&stage.endpoint)))
    })
}

/// A gateway where every service in `registry` is healthy.
#[must_use]
pub fn healthy_services(registry: &ServiceRegistry) -> ScriptedGateway {
    registry.iter().fold(ScriptedGateway::new(), |gateway, service| {
        gateway.respond(service.health_path.clone(), Ok(json!({"status": "UP"})))
    })
}
