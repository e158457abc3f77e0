//! Gateways: the boundary objects for the completion and search services.
//!
//! Both gateways share one retry combinator (`retry`) and one error taxonomy.
//! A gateway checks the injected `ServiceHealth` before touching the network
//! and flips it to unavailable once its retry budget is spent.

pub mod completion;
pub mod retry;
pub mod search;

use crate::health::Service;
use std::time::Duration;
use thiserror::Error;

pub use completion::{
    build_completion_backend, CompletionBackend, CompletionGateway, CompletionRequest,
    DeepSeekBackend, ScriptedCompletion,
};
pub use retry::{run_with_retry, RetryExhausted, RetryPolicy};
pub use search::{
    build_search_backend, ScriptedSearch, SearchBackend, SearchGateway, SearchResult,
    SearxngBackend,
};

/// Why one attempt failed. Everything except `Misconfigured` is retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttemptFailure {
    #[error("rate limited (HTTP 429)")]
    RateLimited,
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("connection error: {0}")]
    Connect(String),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("not configured: {0}")]
    Misconfigured(String),
}

impl AttemptFailure {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AttemptFailure::RateLimited)
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, AttemptFailure::Misconfigured(_))
    }

    /// Map a reqwest transport error onto the attempt taxonomy.
    pub(crate) fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            AttemptFailure::Timeout(timeout)
        } else if let Some(status) = err.status() {
            AttemptFailure::from_status(status.as_u16())
        } else {
            AttemptFailure::Connect(err.to_string())
        }
    }

    pub(crate) fn from_status(code: u16) -> Self {
        if code == 429 {
            AttemptFailure::RateLimited
        } else {
            AttemptFailure::Status(code)
        }
    }
}

/// Errors a gateway call can surface to its caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// The availability flag was already false; no request was sent.
    #[error("{service} service unavailable")]
    ServiceUnavailable { service: Service },
    /// Every attempt failed; the flag has been set to false.
    #[error("{service} service failed after {attempts} attempt(s): {cause}")]
    ServiceError {
        service: Service,
        attempts: u32,
        cause: AttemptFailure,
    },
}

impl GatewayError {
    pub fn service(&self) -> Service {
        match self {
            GatewayError::ServiceUnavailable { service }
            | GatewayError::ServiceError { service, .. } => *service,
        }
    }

    pub(crate) fn exhausted(service: Service, e: RetryExhausted) -> Self {
        GatewayError::ServiceError {
            service,
            attempts: e.attempts,
            cause: e.last,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_is_rate_limit() {
        assert_eq!(AttemptFailure::from_status(429), AttemptFailure::RateLimited);
        assert_eq!(AttemptFailure::from_status(500), AttemptFailure::Status(500));
    }

    #[test]
    fn misconfigured_is_not_retryable() {
        assert!(!AttemptFailure::Misconfigured("no key".into()).is_retryable());
        assert!(AttemptFailure::Status(503).is_retryable());
        assert!(AttemptFailure::Timeout(Duration::from_secs(1)).is_retryable());
    }

    #[test]
    fn error_messages_name_the_service() {
        let e = GatewayError::ServiceError {
            service: Service::Completion,
            attempts: 4,
            cause: AttemptFailure::Status(500),
        };
        let msg = e.to_string();
        assert!(msg.contains("completion"), "{msg}");
        assert!(msg.contains("4 attempt"), "{msg}");
        assert_eq!(e.service(), Service::Completion);
    }
}
