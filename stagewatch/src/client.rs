//! The gateway client: cached aggregate reads and cache-invalidating mutations.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::cache::ResultCache;
use crate::config::StagewatchConfig;
use crate::errors::GatewayError;
use crate::gateway::Gateway;
use crate::pipeline::{RunParams, Stage};
use crate::utils::bounded_call;

/// Default budget for reads and for the fairness report.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Aggregate reads served through the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CachedRead {
    /// Every extracted feature row.
    Features,
    /// Feature extraction statistics.
    FeatureStats,
    /// Every stored prediction.
    Predictions,
    /// Prediction statistics.
    PredictionStats,
    /// Patients currently scored high risk.
    HighRiskPatients,
    /// Fairness audit metrics.
    AuditMetrics,
}

impl CachedRead {
    /// All cached reads.
    pub const ALL: [Self; 6] = [
        Self::Features,
        Self::FeatureStats,
        Self::Predictions,
        Self::PredictionStats,
        Self::HighRiskPatients,
        Self::AuditMetrics,
    ];

    /// Cache key.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Features => "features",
            Self::FeatureStats => "featureStats",
            Self::Predictions => "predictions",
            Self::PredictionStats => "predictionStats",
            Self::HighRiskPatients => "highRiskPatients",
            Self::AuditMetrics => "auditMetrics",
        }
    }

    /// Gateway path.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Features => "/api/v1/features/features",
            Self::FeatureStats => "/api/v1/features/stats",
            Self::Predictions => "/api/v1/predictions/predictions",
            Self::PredictionStats => "/api/v1/predictions/stats",
            Self::HighRiskPatients => "/api/v1/predictions/high-risk",
            Self::AuditMetrics => "/api/v1/audit/metrics",
        }
    }
}

const FAIRNESS_REPORT_PATH: &str = "/api/v1/audit/report";

/// Composes a [`Gateway`] with the [`ResultCache`] it owns.
///
/// Every successful mutation clears the cache before returning.
pub struct GatewayClient {
    gateway: Arc<dyn Gateway>,
    cache: ResultCache,
    read_timeout: Duration,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("cache", &self.cache)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl GatewayClient {
    /// Creates a client with the default TTL and read budget.
    #[must_use]
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self::with_cache(gateway, ResultCache::default())
    }

    /// Creates a client around an existing cache.
    #[must_use]
    pub fn with_cache(gateway: Arc<dyn Gateway>, cache: ResultCache) -> Self {
        Self {
            gateway,
            cache,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Creates a client using the TTL and read budget from `config`.
    #[must_use]
    pub fn from_config(gateway: Arc<dyn Gateway>, config: &StagewatchConfig) -> Self {
        Self::with_cache(gateway, ResultCache::new(config.cache_ttl()))
            .with_read_timeout(config.gateway.default_timeout())
    }

    /// Sets the read budget.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// The owned cache.
    #[must_use]
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// The underlying gateway.
    #[must_use]
    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    /// Reads through the cache. Failed reads are not cached.
    pub async fn read(&self, read: CachedRead) -> Result<serde_json::Value, GatewayError> {
        self.cache
            .get_or_fetch(read.key(), || self.get(read.path()))
            .await
    }

    /// All extracted feature rows.
    pub async fn features(&self) -> Result<serde_json::Value, GatewayError> {
        self.read(CachedRead::Features).await
    }

    /// Feature extraction statistics.
    pub async fn feature_stats(&self) -> Result<serde_json::Value, GatewayError> {
        self.read(CachedRead::FeatureStats).await
    }

    /// All stored predictions.
    pub async fn predictions(&self) -> Result<serde_json::Value, GatewayError> {
        self.read(CachedRead::Predictions).await
    }

    /// Prediction statistics.
    pub async fn prediction_stats(&self) -> Result<serde_json::Value, GatewayError> {
        self.read(CachedRead::PredictionStats).await
    }

    /// Patients currently scored high risk.
    pub async fn high_risk_patients(&self) -> Result<serde_json::Value, GatewayError> {
        self.read(CachedRead::HighRiskPatients).await
    }

    /// Fairness audit metrics.
    pub async fn audit_metrics(&self) -> Result<serde_json::Value, GatewayError> {
        self.read(CachedRead::AuditMetrics).await
    }

    /// Feature row for one patient. Not cached.
    pub async fn patient_features(&self, patient_id: &str) -> Result<serde_json::Value, GatewayError> {
        self.get(&format!("/api/v1/features/features/{patient_id}")).await
    }

    /// Risk prediction for one patient. Not cached.
    pub async fn patient_prediction(&self, patient_id: &str) -> Result<serde_json::Value, GatewayError> {
        self.get(&format!("/api/v1/predictions/risk/{patient_id}")).await
    }

    /// Runs one stage under its own budget.
    ///
    /// On success of a mutating stage the cache is cleared before returning.
    pub async fn execute_stage(
        &self,
        stage: &Stage,
        params: &RunParams,
    ) -> Result<serde_json::Value, GatewayError> {
        let query = stage.query(params);
        let budget = stage.timeout();
        let payload = bounded_call(budget, self.gateway.post(&stage.endpoint, &query, budget)).await?;

        if stage.mutating {
            self.cache.clear();
        }
        debug!(stage = %stage.label, mutating = stage.mutating, "Stage call succeeded");
        Ok(payload)
    }

    /// Asks the audit service to regenerate its fairness report.
    pub async fn generate_fairness_report(&self) -> Result<serde_json::Value, GatewayError> {
        let payload = bounded_call(
            self.read_timeout,
            self.gateway.post(FAIRNESS_REPORT_PATH, &[], self.read_timeout),
        )
        .await?;
        self.cache.clear();
        info!("Fairness report generated");
        Ok(payload)
    }

    async fn get(&self, path: &str) -> Result<serde_json::Value, GatewayError> {
        bounded_call(self.read_timeout, self.gateway.get(path, self.read_timeout)).await
    }
}
