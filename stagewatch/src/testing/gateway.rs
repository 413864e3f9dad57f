//! A gateway that answers from a script instead of the network.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::errors::GatewayError;
use crate::gateway::{Gateway, QueryParam};

/// HTTP method of a recorded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

/// One call observed by a [`ScriptedGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Method used.
    pub method: Method,
    /// Path requested.
    pub path: String,
    /// Query parameters sent.
    pub query: Vec<QueryParam>,
    /// Budget the caller passed.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
struct Reply {
    delay: Option<Duration>,
    result: Result<serde_json::Value, GatewayError>,
}

#[derive(Debug, Default)]
struct Script {
    once: VecDeque<Reply>,
    sticky: Option<Reply>,
}

/// Per-path scripted responses with call recording.
///
/// Paths without a script fail as unreachable. One-shot replies are consumed
/// in order before the sticky reply for the same path.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGateway {
    /// Creates a gateway with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every call to `path` with `result`.
    #[must_use]
    pub fn respond(self, path: impl Into<String>, result: Result<serde_json::Value, GatewayError>) -> Self {
        self.set_response(path, result);
        self
    }

    /// Answers every call to `path` with `result` after `delay`.
    #[must_use]
    pub fn respond_after(
        self,
        path: impl Into<String>,
        delay: Duration,
        result: Result<serde_json::Value, GatewayError>,
    ) -> Self {
        self.scripts.lock().entry(path.into()).or_default().sticky = Some(Reply {
            delay: Some(delay),
            result,
        });
        self
    }

    /// Answers the next call to `path` with `result`.
    #[must_use]
    pub fn respond_once(
        self,
        path: impl Into<String>,
        result: Result<serde_json::Value, GatewayError>,
    ) -> Self {
        self.scripts
            .lock()
            .entry(path.into())
            .or_default()
            .once
            .push_back(Reply { delay: None, result });
        self
    }

    /// Replaces the sticky reply for `path`.
    pub fn set_response(&self, path: impl Into<String>, result: Result<serde_json::Value, GatewayError>) {
        self.scripts.lock().entry(path.into()).or_default().sticky = Some(Reply {
            delay: None,
            result,
        });
    }

    /// Number of calls made to `path`.
    #[must_use]
    pub fn calls(&self, path: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.path == path).count()
    }

    /// Number of calls made to any path.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    /// Every call, in the order it was made.
    #[must_use]
    pub fn call_log(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Paths called, in order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.path.clone()).collect()
    }

    /// Forgets recorded calls. Scripts are kept.
    pub fn reset_calls(&self) {
        self.calls.lock().clear();
    }

    async fn answer(
        &self,
        method: Method,
        path: &str,
        query: &[QueryParam],
        timeout: Duration,
    ) -> Result<serde_json::Value, GatewayError> {
        self.calls.lock().push(RecordedCall {
            method,
            path: path.to_string(),
            query: query.to_vec(),
            timeout,
        });

        let reply = {
            let mut scripts = self.scripts.lock();
            scripts.get_mut(path).and_then(|script| {
                script.once.pop_front().or_else(|| script.sticky.clone())
            })
        };

        let Some(reply) = reply else {
            return Err(GatewayError::unreachable(format!(
                "connect ECONNREFUSED: no route for {path}"
            )));
        };

        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        reply.result
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn post(
        &self,
        path: &str,
        query: &[QueryParam],
        timeout: Duration,
    ) -> Result<serde_json::Value, GatewayError> {
        self.answer(Method::Post, path, query, timeout).await
    }

    async fn get(&self, path: &str, timeout: Duration) -> Result<serde_json::Value, GatewayError> {
        self.answer(Method::Get, path, &[], timeout).await
    }
}
