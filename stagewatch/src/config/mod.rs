//! Runtime configuration.
//!
//! Everything the core needs from outside: the gateway location, the ordered
//! stage list, the service registry, and the timing knobs. Documents are JSON
//! with every field optional; missing fields take the defaults below.
//! A handful of environment variables override the document.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::errors::{ConfigError, StagewatchError};
use crate::health::{default_registry, ServiceRegistry};
use crate::pipeline::{default_stages, duration_ms, validate_stages, Stage, DEFAULT_COUNT};

/// Overrides the gateway base URL.
pub const ENV_GATEWAY_URL: &str = "STAGEWATCH_GATEWAY_URL";
/// Overrides the cache TTL in milliseconds.
pub const ENV_CACHE_TTL_MS: &str = "STAGEWATCH_CACHE_TTL_MS";
/// Overrides the health poll interval in milliseconds.
pub const ENV_HEALTH_INTERVAL_MS: &str = "STAGEWATCH_HEALTH_INTERVAL_MS";

/// Where and how to reach the processing gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL every path is resolved against.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Additional headers sent with every call.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Budget for aggregate reads, in milliseconds.
    #[serde(default = "default_read_timeout_ms")]
    pub default_timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:8085".to_string()
}

fn default_user_agent() -> String {
    concat!("stagewatch/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_read_timeout_ms() -> u64 {
    30_000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            headers: HashMap::new(),
            default_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl GatewayConfig {
    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Read budget as a `Duration`.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagewatchConfig {
    /// Gateway connection settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Ordered stage list. Ordinals are reassigned on load.
    #[serde(default = "default_stages")]
    pub stages: Vec<Stage>,
    /// Services probed each health cycle.
    #[serde(default = "default_registry")]
    pub services: ServiceRegistry,
    /// TTL for cached aggregate reads.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    /// Interval between health cycles.
    #[serde(default = "default_health_interval_ms")]
    pub health_poll_interval_ms: u64,
    /// Budget for one health probe.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Count substituted into the sync stage when the caller gives none.
    #[serde(default = "default_count")]
    pub default_count: u32,
}

fn default_cache_ttl_ms() -> u64 {
    60_000
}

fn default_health_interval_ms() -> u64 {
    30_000
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_count() -> u32 {
    DEFAULT_COUNT
}

impl Default for StagewatchConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            stages: default_stages(),
            services: default_registry(),
            cache_ttl_ms: default_cache_ttl_ms(),
            health_poll_interval_ms: default_health_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            default_count: default_count(),
        }
    }
}

impl StagewatchConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(json)?;
        config.stages = crate::pipeline::sequence(config.stages);
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON document from disk, applies environment overrides and validates.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StagewatchError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration");
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&contents)?.with_env_overrides()?;
        Ok(config)
    }

    /// Applies overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, then re-validates.
    ///
    /// Empty values are ignored.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(ENV_GATEWAY_URL) {
            debug!(base_url = %url, "Gateway URL overridden from environment");
            self.gateway.base_url = url;
        }
        if let Some(raw) = lookup(ENV_CACHE_TTL_MS) {
            self.cache_ttl_ms = parse_millis(ENV_CACHE_TTL_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_HEALTH_INTERVAL_MS) {
            self.health_poll_interval_ms = parse_millis(ENV_HEALTH_INTERVAL_MS, &raw)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Checks every field the runtime depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.base_url.trim().is_empty() {
            return Err(ConfigError::invalid("gateway.base_url", "must not be empty"));
        }
        if self.gateway.default_timeout_ms == 0 {
            return Err(ConfigError::invalid("gateway.default_timeout_ms", "must be positive"));
        }
        for (field, value) in [
            ("cache_ttl_ms", self.cache_ttl_ms),
            ("health_poll_interval_ms", self.health_poll_interval_ms),
            ("probe_timeout_ms", self.probe_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be positive"));
            }
        }
        validate_stages(&self.stages)?;
        self.services.validate()
    }

    /// Cache TTL as a `Duration`.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Health poll interval as a `Duration`.
    #[must_use]
    pub fn health_poll_interval(&self) -> Duration {
        Duration::from_millis(self.health_poll_interval_ms)
    }

    /// Probe budget as a `Duration`.
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Sets the cache TTL.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_ms = duration_ms(ttl);
        self
    }

    /// Replaces the stage list, assigning ordinals.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<Stage>) -> Self {
        self.stages = crate::pipeline::sequence(stages);
        self
    }
}

fn parse_millis(field: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::invalid(field, format!("expected milliseconds, got '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_defaults() {
        let config = StagewatchConfig::default();

        assert_eq!(config.gateway.base_url, "http://localhost:8085");
        assert_eq!(config.gateway.default_timeout(), Duration::from_secs(30));
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.health_poll_interval(), Duration::from_secs(30));
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.stages.len(), 4);
        assert_eq!(config.services.len(), 7);
        assert_ok!(config.validate());
    }

    #[test]
    fn test_empty_document_fills_defaults() {
        let config = assert_ok!(StagewatchConfig::from_json_str("{}"));
        assert_eq!(config, StagewatchConfig::default());
    }

    #[test]
    fn test_round_trip() {
        let config = StagewatchConfig::default()
            .with_cache_ttl(Duration::from_secs(5))
            .with_stages(vec![Stage::new("Only", "/only").read_only()]);

        let json = serde_json::to_string(&config).unwrap();
        let parsed = assert_ok!(StagewatchConfig::from_json_str(&json));
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_document_assigns_ordinals() {
        let config = assert_ok!(StagewatchConfig::from_json_str(
            r#"{
                "stages": [
                    {"label": "First", "endpoint": "/one"},
                    {"label": "Second", "endpoint": "/two", "timeout_ms": 1000}
                ],
                "cache_ttl_ms": 1500
            }"#
        ));

        assert_eq!(config.stages[1].ordinal, 1);
        assert_eq!(config.stages[1].timeout(), Duration::from_secs(1));
        assert_eq!(config.cache_ttl(), Duration::from_millis(1500));
        assert_eq!(config.services, default_registry());
    }

    #[test]
    fn test_invalid_documents_rejected() {
        assert!(matches!(
            StagewatchConfig::from_json_str("not json"),
            Err(ConfigError::Parse(_))
        ));
        assert_err!(StagewatchConfig::from_json_str(r#"{"cache_ttl_ms": 0}"#));
        assert_err!(StagewatchConfig::from_json_str(
            r#"{"stages": [{"label": "A", "endpoint": "/a"}, {"label": "A", "endpoint": "/b"}]}"#
        ));
        assert_err!(StagewatchConfig::from_json_str(
            r#"{"services": [{"name": "", "health_path": "/h"}]}"#
        ));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_GATEWAY_URL, "http://gateway:9000"),
            (ENV_CACHE_TTL_MS, "2500"),
            (ENV_HEALTH_INTERVAL_MS, " "),
        ]
        .into_iter()
        .collect();

        let config = assert_ok!(StagewatchConfig::default()
            .apply_overrides(|key| env.get(key).map(|v| (*v).to_string())));

        assert_eq!(config.gateway.base_url, "http://gateway:9000");
        assert_eq!(config.cache_ttl_ms, 2500);
        assert_eq!(config.health_poll_interval_ms, 30_000);
    }

    #[test]
    fn test_override_must_be_millis() {
        let result = StagewatchConfig::default().apply_overrides(|key| {
            (key == ENV_CACHE_TTL_MS).then(|| "sixty".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));

        let zero = StagewatchConfig::default()
            .apply_overrides(|key| (key == ENV_HEALTH_INTERVAL_MS).then(|| "0".to_string()));
        assert_err!(zero);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"probe_timeout_ms": 750, "default_count": 10}}"#).unwrap();

        let config = assert_ok!(StagewatchConfig::from_file(file.path()));
        assert_eq!(config.probe_timeout(), Duration::from_millis(750));
        assert_eq!(config.default_count, 10);
    }

    #[test]
    fn test_from_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = StagewatchConfig::from_file(dir.path().join("absent.json"));
        assert!(matches!(result, Err(StagewatchError::Io(_))));
    }
}
