//! Error types for tagchain-resolve
//!
//! Every upstream failure is classified exactly once, when the HTTP response
//! (or transport error) is turned into a [`ResolveError`]. The retry policy
//! then only asks [`ResolveError::is_retryable`].

use reqwest::StatusCode;
use thiserror::Error;

use crate::cache::CacheError;

/// Result type for resolution operations
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Resolution error
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Upstream answered 404 for a lookup
    #[error("{service}: not found: {resource}")]
    NotFound {
        service: &'static str,
        resource: String,
    },

    /// Upstream rejected the request (4xx other than 404/429)
    #[error("{service}: client error {status}: {message}")]
    ClientError {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// Upstream asked us to slow down (429)
    #[error("{service}: rate limited (HTTP 429)")]
    RateLimited { service: &'static str },

    /// Transient upstream fault (5xx)
    #[error("{service}: server error {status}")]
    ServerError { service: &'static str, status: u16 },

    /// Connectivity problem: timeout, reset, DNS
    #[error("{service}: network error: {message}")]
    Network {
        service: &'static str,
        message: String,
    },

    /// Response body did not match the provider contract
    #[error("{service}: malformed response: {message}")]
    MalformedResponse {
        service: &'static str,
        message: String,
    },

    /// Retryable failures persisted through every allowed attempt
    #[error("{service}: giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        service: &'static str,
        attempts: u32,
        last: Box<ResolveError>,
    },

    /// External fingerprint binary is missing
    #[error("Fingerprint tool unavailable: {0}")]
    ToolUnavailable(String),

    /// External fingerprint binary ran but did not produce a fingerprint
    #[error("Fingerprint tool failed: {0}")]
    ToolFailed(String),

    /// Missing or invalid configuration (e.g. no AcoustID key)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cache storage fault
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// tagchain-common error
    #[error("Common error: {0}")]
    Common(#[from] tagchain_common::Error),
}

impl ResolveError {
    /// Classify a non-success HTTP status
    pub fn from_status(service: &'static str, status: StatusCode, body: String) -> Self {
        let code = status.as_u16();
        match code {
            404 => ResolveError::NotFound {
                service,
                resource: body,
            },
            429 => ResolveError::RateLimited { service },
            500..=599 => ResolveError::ServerError {
                service,
                status: code,
            },
            _ => ResolveError::ClientError {
                service,
                status: code,
                message: body,
            },
        }
    }

    /// Classify a transport-level reqwest failure
    pub fn from_transport(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ResolveError::MalformedResponse {
                service,
                message: err.to_string(),
            };
        }
        ResolveError::Network {
            service,
            message: err.to_string(),
        }
    }

    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ResolveError::RateLimited { .. }
            | ResolveError::ServerError { .. }
            | ResolveError::Network { .. } => true,
            ResolveError::NotFound { .. }
            | ResolveError::ClientError { .. }
            | ResolveError::MalformedResponse { .. }
            | ResolveError::RetriesExhausted { .. }
            | ResolveError::ToolUnavailable(_)
            | ResolveError::ToolFailed(_)
            | ResolveError::Config(_)
            | ResolveError::Cache(_)
            | ResolveError::Common(_) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound { .. })
    }

    /// Upstream service the failure came from, if any
    pub fn service(&self) -> Option<&'static str> {
        match self {
            ResolveError::NotFound { service, .. }
            | ResolveError::ClientError { service, .. }
            | ResolveError::RateLimited { service }
            | ResolveError::ServerError { service, .. }
            | ResolveError::Network { service, .. }
            | ResolveError::MalformedResponse { service, .. }
            | ResolveError::RetriesExhausted { service, .. } => Some(service),
            _ => None,
        }
    }

    /// HTTP status behind the failure, looking through exhausted retries
    pub fn status(&self) -> Option<u16> {
        match self {
            ResolveError::NotFound { .. } => Some(404),
            ResolveError::RateLimited { .. } => Some(429),
            ResolveError::ClientError { status, .. } | ResolveError::ServerError { status, .. } => {
                Some(*status)
            }
            ResolveError::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Attempts made before giving up (1 for immediate terminal failures)
    pub fn attempts(&self) -> u32 {
        match self {
            ResolveError::RetriesExhausted { attempts, .. } => *attempts,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let e = ResolveError::from_status("svc", StatusCode::FORBIDDEN, String::new());
        assert!(matches!(e, ResolveError::ClientError { status: 403, .. }));
        assert!(!e.is_retryable());

        let e = ResolveError::from_status("svc", StatusCode::NOT_FOUND, "x".into());
        assert!(e.is_not_found());
        assert!(!e.is_retryable());

        let e = ResolveError::from_status("svc", StatusCode::TOO_MANY_REQUESTS, String::new());
        assert!(matches!(e, ResolveError::RateLimited { .. }));
        assert!(e.is_retryable());

        let e = ResolveError::from_status("svc", StatusCode::BAD_GATEWAY, String::new());
        assert!(matches!(e, ResolveError::ServerError { status: 502, .. }));
        assert!(e.is_retryable());
    }

    #[test]
    fn test_exhausted_carries_details() {
        let e = ResolveError::RetriesExhausted {
            service: "MusicBrainz",
            attempts: 4,
            last: Box::new(ResolveError::ServerError {
                service: "MusicBrainz",
                status: 503,
            }),
        };
        assert!(!e.is_retryable());
        assert_eq!(e.service(), Some("MusicBrainz"));
        assert_eq!(e.status(), Some(503));
        assert_eq!(e.attempts(), 4);
        assert!(e.to_string().contains("4 attempts"));
    }
}
