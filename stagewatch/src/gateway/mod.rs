//! The remote service gateway contract.
//!
//! The core never talks to the network directly. Stages are executed with
//! [`Gateway::post`] and probes with [`Gateway::get`]; both return the decoded
//! JSON body or a [`GatewayError`]. Timeouts are passed per call because each
//! stage and probe carries its own budget.

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpGateway;

use async_trait::async_trait;
use std::time::Duration;

use crate::errors::GatewayError;

/// A query string parameter.
pub type QueryParam = (String, String);

/// Protocol for issuing remote calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Issues `POST {path}?{query}` with an empty JSON body.
    async fn post(
        &self,
        path: &str,
        query: &[QueryParam],
        timeout: Duration,
    ) -> Result<serde_json::Value, GatewayError>;

    /// Issues `GET {path}`.
    async fn get(&self, path: &str, timeout: Duration) -> Result<serde_json::Value, GatewayError>;
}

/// Extracts the server-supplied message from an error body.
///
/// Services report failures as `{"error": "..."}`; some use `message`.
#[must_use]
pub fn remote_message(body: &serde_json::Value) -> Option<String> {
    ["error", "message"]
        .iter()
        .find_map(|field| body.get(field).and_then(serde_json::Value::as_str))
        .map(str::to_string)
}
