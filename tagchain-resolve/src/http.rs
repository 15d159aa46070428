//! Shared HTTP client for upstream web services
//!
//! Wraps `reqwest::Client` with the tagchain User-Agent and turns every
//! outcome into either a decoded JSON body or a classified [`ResolveError`].
//! [`ServiceClient`] binds the shared client to one service's rate limiter
//! and retry policy.

use crate::error::{ResolveError, ResolveResult};
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryPolicy;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Default total timeout per request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-over-GET client
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Build a client that sends `user_agent` on every request
    pub fn new(user_agent: &str, timeout: Duration) -> ResolveResult<Self> {
        let mut headers = header::HeaderMap::new();
        let value = header::HeaderValue::from_str(user_agent)
            .map_err(|e| ResolveError::Config(format!("Invalid user agent: {}", e)))?;
        headers.insert(header::USER_AGENT, value);
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .default_headers(headers)
            .build()
            .map_err(|e| ResolveError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// GET `url` with `query` and decode a JSON body.
    ///
    /// Non-success statuses are classified via [`ResolveError::from_status`];
    /// a 2xx body that fails to decode is [`ResolveError::MalformedResponse`].
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        service: &'static str,
        url: &str,
        query: &[(&str, &str)],
    ) -> ResolveResult<T> {
        debug!(service, url, "Upstream request");

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| ResolveError::from_transport(service, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ResolveError::from_transport(service, e))?;

        if !status.is_success() {
            debug!(service, status = status.as_u16(), "Upstream returned error status");
            return Err(ResolveError::from_status(service, status, truncate(&body)));
        }

        serde_json::from_str(&body).map_err(|e| ResolveError::MalformedResponse {
            service,
            message: e.to_string(),
        })
    }
}

/// Rate-limited, retrying access to one upstream service
#[derive(Clone)]
pub struct ServiceClient {
    http: HttpClient,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl ServiceClient {
    pub fn new(http: HttpClient, limiter: RateLimiter, retry: RetryPolicy) -> Self {
        Self {
            http,
            limiter,
            retry,
        }
    }

    pub fn service(&self) -> &'static str {
        self.limiter.service()
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// [`HttpClient::get_json`] under the retry policy, one limiter slot per attempt
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> ResolveResult<T> {
        self.get_json_then(url, query, Ok).await
    }

    /// Like [`get_json`](Self::get_json), with `map` applied inside each
    /// attempt so errors it returns are classified and retried too
    pub async fn get_json_then<T, U, F>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        map: F,
    ) -> ResolveResult<U>
    where
        T: DeserializeOwned,
        F: Fn(T) -> ResolveResult<U>,
    {
        let service = self.limiter.service();
        let http = &self.http;
        let map = &map;
        self.retry
            .execute(&self.limiter, || async move {
                let body: T = http.get_json(service, url, query).await?;
                map(body)
            })
            .await
    }
}

/// Keep error bodies short enough for log lines
fn truncate(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        assert!(HttpClient::new("tagchain/test", DEFAULT_TIMEOUT).is_ok());
    }

    #[test]
    fn test_invalid_user_agent_rejected() {
        let result = HttpClient::new("bad\nagent", DEFAULT_TIMEOUT);
        assert!(matches!(result, Err(ResolveError::Config(_))));
    }

    #[test]
    fn test_truncate_long_body() {
        let long = "x".repeat(500);
        let short = truncate(&long);
        assert_eq!(short.len(), 203);
        assert_eq!(truncate("ok"), "ok");
    }
}
