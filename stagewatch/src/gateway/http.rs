//! `reqwest`-backed gateway.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use super::{remote_message, Gateway, QueryParam};
use crate::config::GatewayConfig;
use crate::errors::{ConfigError, GatewayError, StagewatchError};
use crate::pipeline::duration_ms;

/// A gateway that issues real HTTP calls against a base URL.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    /// Builds a gateway from configuration.
    pub fn new(config: &GatewayConfig) -> Result<Self, StagewatchError> {
        let mut headers = reqwest::header::HeaderMap::new();
        for (name, value) in &config.headers {
            let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| {
                    ConfigError::invalid("gateway.headers", format!("invalid header name '{name}': {e}"))
                })?;
            let value = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
                ConfigError::invalid(format!("gateway.headers.{name}"), format!("invalid header value: {e}"))
            })?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.default_timeout())
            .build()
            .map_err(|e| ConfigError::invalid("gateway", format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the base URL every path is resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn send(&self, request: RequestBuilder, timeout: Duration) -> Result<serde_json::Value, GatewayError> {
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_transport_error(&e, timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error(&e, timeout))?;

        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|value| remote_message(&value))
                .unwrap_or_else(|| reason_phrase(status));
            warn!(status = status.as_u16(), message = %message, "Remote call failed");
            return Err(GatewayError::remote(status.as_u16(), message));
        }

        Ok(success_body(body))
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn post(
        &self,
        path: &str,
        query: &[QueryParam],
        timeout: Duration,
    ) -> Result<serde_json::Value, GatewayError> {
        let url = self.url(path);
        debug!(url = %url, ?query, timeout_ms = duration_ms(timeout), "POST");

        let request = self
            .client
            .post(&url)
            .query(query)
            .json(&serde_json::json!({}));
        self.send(request, timeout).await
    }

    async fn get(&self, path: &str, timeout: Duration) -> Result<serde_json::Value, GatewayError> {
        let url = self.url(path);
        debug!(url = %url, timeout_ms = duration_ms(timeout), "GET");

        self.send(self.client.get(&url), timeout).await
    }
}

fn map_transport_error(error: &reqwest::Error, timeout: Duration) -> GatewayError {
    if error.is_timeout() {
        GatewayError::timeout(timeout)
    } else if error.is_decode() || error.is_body() {
        GatewayError::malformed(error.to_string())
    } else {
        GatewayError::unreachable(error.to_string())
    }
}

/// Success bodies are not validated: JSON is parsed, anything else is kept as text.
fn success_body(body: String) -> serde_json::Value {
    if body.trim().is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body))
}

fn reason_phrase(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CompositeHealth, HealthStatus};
    use crate::health::{HealthAggregator, ServiceDescriptor, ServiceRegistry};
    use crate::testing::assert_service_status;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response on a loopback port and returns its base URL.
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}")
    }

    fn plain_ok() -> &'static str {
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK"
    }

    fn gateway(base_url: &str) -> HttpGateway {
        let config = GatewayConfig {
            base_url: base_url.to_string(),
            ..GatewayConfig::default()
        };
        HttpGateway::new(&config).unwrap()
    }

    #[test]
    fn test_url_joins_paths() {
        let gw = gateway("http://localhost:8085/");
        assert_eq!(gw.base_url(), "http://localhost:8085");
        assert_eq!(gw.url("/health"), "http://localhost:8085/health");
        assert_eq!(gw.url("api/v1/fhir/health"), "http://localhost:8085/api/v1/fhir/health");
    }

    #[test]
    fn test_reason_phrase() {
        assert_eq!(reason_phrase(StatusCode::SERVICE_UNAVAILABLE), "Service Unavailable");
    }

    #[test]
    fn test_invalid_header_is_config_error() {
        let mut config = GatewayConfig::default();
        config.headers.insert("bad header".to_string(), "x".to_string());

        let err = HttpGateway::new(&config).unwrap_err();
        assert!(
            matches!(
                &err,
                StagewatchError::Config(ConfigError::Invalid { field, .. }) if field == "gateway.headers"
            ),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn test_success_body_is_not_validated() {
        assert_eq!(success_body(String::new()), serde_json::Value::Null);
        assert_eq!(success_body(r#"{"status":"UP"}"#.to_string()), json!({"status": "UP"}));
        assert_eq!(success_body("OK".to_string()), json!("OK"));
    }

    #[tokio::test]
    async fn test_plain_text_success_is_returned_as_string() {
        let gw = gateway(&serve_once(plain_ok()).await);
        let body = gw.get("/health", Duration::from_secs(5)).await.unwrap();
        assert_eq!(body, json!("OK"));
    }

    #[tokio::test]
    async fn test_plain_text_health_body_is_healthy() {
        let gw = gateway(&serve_once(plain_ok()).await);
        let registry = ServiceRegistry::new(vec![ServiceDescriptor::new("gateway", "/health")]);

        let snapshot = HealthAggregator::new(Arc::new(gw)).check_all(&registry).await;

        assert_service_status(&snapshot, "gateway", HealthStatus::Healthy);
        assert_eq!(snapshot.composite, CompositeHealth::Healthy);
    }

    #[tokio::test]
    async fn test_error_status_uses_server_message() {
        let base = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Type: application/json\r\nContent-Length: 27\r\nConnection: close\r\n\r\n{\"error\":\"database locked\"}",
        )
        .await;
        let err = gateway(&base).post("/run", &[], Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err.user_message(), "database locked");
    }

    #[tokio::test]
    async fn test_refused_connection_is_unreachable() {
        // Port 1 on loopback has no listener.
        let gw = gateway("http://127.0.0.1:1");
        let err = gw.get("/health", Duration::from_secs(5)).await.unwrap_err();
        assert!(err.is_unreachable(), "unexpected error: {err:?}");
    }
}
