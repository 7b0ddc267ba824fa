use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use thiserror::Error;

/// Classified failure kind attached to every execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// The provider did not answer within the attempt deadline
    Timeout,
    /// The provider rejected the request due to rate limiting
    RateLimit,
    /// Credentials were missing, revoked, or insufficient
    Auth,
    /// The provider failed internally (5xx)
    Server,
    /// Connection-level failure before a response was received
    Network,
    /// The request itself was malformed or unacceptable
    Validation,
    /// Anything that could not be classified
    Unknown,
}

impl ErrorKind {
    /// Whether retrying the same provider may succeed
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::RateLimit | Self::Server | Self::Network)
    }

    /// Whether the failure is a property of the request rather than the provider
    ///
    /// Such failures end a fallback chain since no other provider will accept
    /// the same malformed request.
    pub const fn is_request_fault(self) -> bool {
        matches!(self, Self::Validation)
    }

    /// Classify an HTTP-style status code
    pub const fn from_status(status: u16) -> Self {
        match status {
            408 | 504 => Self::Timeout,
            429 => Self::RateLimit,
            401 | 403 => Self::Auth,
            400 | 404 | 409 | 413 | 415 | 422 => Self::Validation,
            500..=599 => Self::Server,
            _ => Self::Unknown,
        }
    }

    /// Classify from free-form error text when no status is available
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("timed out") || lower.contains("timeout") || lower.contains("deadline") {
            Self::Timeout
        } else if lower.contains("rate limit") || lower.contains("too many requests") || lower.contains("quota") {
            Self::RateLimit
        } else if lower.contains("unauthorized")
            || lower.contains("forbidden")
            || lower.contains("api key")
            || lower.contains("authentication")
        {
            Self::Auth
        } else if lower.contains("connection")
            || lower.contains("dns")
            || lower.contains("network")
            || lower.contains("reset by peer")
        {
            Self::Network
        } else if lower.contains("invalid") || lower.contains("malformed") || lower.contains("validation") {
            Self::Validation
        } else if lower.contains("internal") || lower.contains("unavailable") || lower.contains("overloaded") {
            Self::Server
        } else {
            Self::Unknown
        }
    }
}

/// Typed error returned by a provider adapter
#[derive(Debug, Clone, Error)]
#[error("{kind} error from provider: {message}")]
pub struct ProviderError {
    /// Classified failure kind
    pub kind: ErrorKind,
    /// Human-readable detail
    pub message: String,
    /// Upstream status code, when the failure came from an HTTP response
    pub status: Option<u16>,
    /// Provider-supplied back-off hint
    pub retry_after: Option<Duration>,
}

impl ProviderError {
    /// Create an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            retry_after: None,
        }
    }

    /// Create an error classified from an upstream status code
    ///
    /// Status classification wins; when the status is not informative the
    /// message content is consulted.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = match ErrorKind::from_status(status) {
            ErrorKind::Unknown => ErrorKind::from_message(&message),
            kind => kind,
        };

        Self {
            kind,
            message,
            status: Some(status),
            retry_after: None,
        }
    }

    /// Create an error classified from message content alone
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorKind::from_message(&message), message)
    }

    /// Attempt deadline elapsed
    pub fn timeout(after: Duration) -> Self {
        Self::new(ErrorKind::Timeout, format!("attempt timed out after {}ms", after.as_millis()))
    }

    /// Attach a back-off hint
    #[must_use]
    pub const fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Whether retrying the same provider may succeed
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::RateLimit.is_retryable());
        assert!(ErrorKind::Server.is_retryable());
        assert!(ErrorKind::Network.is_retryable());
        assert!(!ErrorKind::Auth.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::Unknown.is_retryable());
    }

    #[test]
    fn status_classification() {
        assert_eq!(ErrorKind::from_status(429), ErrorKind::RateLimit);
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Auth);
        assert_eq!(ErrorKind::from_status(422), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::Server);
        assert_eq!(ErrorKind::from_status(504), ErrorKind::Timeout);
    }

    #[test]
    fn uninformative_status_falls_back_to_message() {
        let err = ProviderError::from_status(418, "connection reset by peer");
        assert_eq!(err.kind, ErrorKind::Network);
        assert_eq!(err.status, Some(418));
    }

    #[test]
    fn message_classification() {
        assert_eq!(ErrorKind::from_message("Request timed out"), ErrorKind::Timeout);
        assert_eq!(ErrorKind::from_message("Rate limit reached"), ErrorKind::RateLimit);
        assert_eq!(ErrorKind::from_message("invalid API key"), ErrorKind::Auth);
        assert_eq!(ErrorKind::from_message("something odd"), ErrorKind::Unknown);
    }

    #[test]
    fn display_includes_kind() {
        let err = ProviderError::new(ErrorKind::RateLimit, "slow down");
        assert_eq!(err.to_string(), "rate_limit error from provider: slow down");
    }
}
