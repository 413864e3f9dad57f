//! Bounded execution of remote calls.
//!
//! Gateways are expected to honour the timeout they are given, but the
//! orchestrator and the aggregator also enforce it locally so a misbehaving
//! gateway cannot stretch a stage or a probe past its budget.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::errors::GatewayError;

/// Result of a timed operation.
#[derive(Debug)]
pub enum TimedResult<T, E> {
    /// Operation completed successfully.
    Ok(T),
    /// Operation failed with an error.
    Err(E),
    /// Operation did not settle within its budget.
    Timeout,
}

impl<T, E> TimedResult<T, E> {
    /// Returns true if the operation succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, TimedResult::Ok(_))
    }

    /// Returns true if the operation failed.
    #[must_use]
    pub fn is_err(&self) -> bool {
        matches!(self, TimedResult::Err(_))
    }

    /// Returns true if the operation timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, TimedResult::Timeout)
    }

    /// Converts to a standard Result, treating timeout as an error.
    pub fn into_result(self, timeout_error: E) -> Result<T, E> {
        match self {
            TimedResult::Ok(v) => Ok(v),
            TimedResult::Err(e) => Err(e),
            TimedResult::Timeout => Err(timeout_error),
        }
    }
}

/// Runs a future with a timeout.
pub async fn run_with_timeout<T, E, F>(duration: Duration, future: F) -> TimedResult<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match timeout(duration, future).await {
        Ok(Ok(value)) => TimedResult::Ok(value),
        Ok(Err(error)) => TimedResult::Err(error),
        Err(_) => TimedResult::Timeout,
    }
}

/// Runs a gateway call under `budget`, mapping expiry to [`GatewayError::Timeout`].
pub async fn bounded_call<T, F>(budget: Duration, call: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    run_with_timeout(budget, call)
        .await
        .into_result(GatewayError::timeout(budget))
}
