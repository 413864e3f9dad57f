//! Error types for stagewatch.
//!
//! Remote failures are described by [`GatewayError`]. The orchestrator and the
//! health aggregator convert them into records at their boundaries, so the
//! only errors that escape to callers are configuration problems and caller
//! mistakes such as starting a second run on a busy orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// The crate-level error type.
#[derive(Debug, Error)]
pub enum StagewatchError {
    /// Configuration could not be parsed or failed validation.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The orchestrator rejected a run request.
    #[error("{0}")]
    Orchestrator(#[from] OrchestratorError),

    /// A gateway could not be constructed or a direct call failed.
    #[error("{0}")]
    Gateway(#[from] GatewayError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single remote call made through a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GatewayError {
    /// No route to the service, or the connection was refused.
    #[error("Network unreachable: {message}")]
    NetworkUnreachable {
        /// Transport-level description.
        message: String,
    },

    /// The call exceeded its stage- or probe-specific budget.
    #[error("Timed out after {}ms", .timeout.as_millis())]
    Timeout {
        /// The budget that was exceeded.
        timeout: Duration,
    },

    /// The service answered with a non-success response.
    #[error("Remote error ({status}): {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Server-supplied message, or the status reason phrase.
        message: String,
    },

    /// The response body could not be read as JSON.
    #[error("Malformed response: {message}")]
    MalformedResponse {
        /// Decoder message.
        message: String,
    },
}

impl GatewayError {
    /// Creates a network unreachable error.
    #[must_use]
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::NetworkUnreachable {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout { timeout }
    }

    /// Creates a remote error.
    #[must_use]
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Creates a malformed response error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// The message shown next to a failed stage in the run history.
    ///
    /// Remote errors surface the server's own message; everything else uses
    /// the transport description.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NetworkUnreachable { message } | Self::MalformedResponse { message } => {
                message.clone()
            }
            Self::Remote { message, .. } => message.clone(),
            Self::Timeout { .. } => self.to_string(),
        }
    }

    /// Returns true for failures where the service could not be reached at all.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::NetworkUnreachable { .. })
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();

        match self {
            Self::NetworkUnreachable { .. } => {
                map.insert("type".to_string(), serde_json::json!("NetworkUnreachable"));
            }
            Self::Timeout { timeout } => {
                map.insert("type".to_string(), serde_json::json!("Timeout"));
                map.insert(
                    "timeout_ms".to_string(),
                    serde_json::json!(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)),
                );
            }
            Self::Remote { status, .. } => {
                map.insert("type".to_string(), serde_json::json!("RemoteError"));
                map.insert("status".to_string(), serde_json::json!(status));
            }
            Self::MalformedResponse { .. } => {
                map.insert("type".to_string(), serde_json::json!("MalformedResponse"));
            }
        }

        map.insert("message".to_string(), serde_json::json!(self.user_message()));
        map
    }
}

/// Errors returned when a run request is rejected before any stage is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// Another run is still active on this orchestrator.
    #[error("A pipeline run is already in progress (stage {active_stage})")]
    AlreadyRunning {
        /// Index of the stage currently executing.
        active_stage: usize,
    },

    /// The requested stage does not exist.
    #[error("Stage index {index} is out of range for a pipeline of {total} stages")]
    StageIndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of declared stages.
        total: usize,
    },
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration document is not valid JSON for the expected shape.
    #[error("Invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field holds a value the runtime cannot work with.
    #[error("Invalid configuration field '{field}': {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    /// Creates an invalid field error.
    #[must_use]
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
