//! Resilient request executor
//!
//! Issues one logical call, classifies each response and retries transient
//! conditions in a bounded loop.
//!
//! | Condition                    | Handling                          |
//! |------------------------------|-----------------------------------|
//! | transport error              | retry after backoff               |
//! | 2xx (except 204 on GET)      | success                           |
//! | 204 on GET                   | retry after backoff               |
//! | 403                          | terminal `Forbidden`              |
//! | 404                          | returned as a normal result       |
//! | 429                          | retry after backoff               |
//! | 500, 502, 503                | terminal `Server`                 |
//! | anything else                | returned as a normal result       |

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tracing::{debug, error, warn};

use super::credentials::Credentials;
use super::error::RemoteError;
use super::transport::{HttpRequest, HttpResponse, Method, Transport};

/// Retry ceiling and fixed backoff between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: Duration::from_secs(10),
        }
    }
}

/// Verdict for a single response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Hand the response to the caller
    Accept,
    /// Transient, try again
    Retry,
    /// 403, authorization will not change mid-run
    Forbidden,
    /// 500/502/503, surfaced immediately
    ServerError,
}

/// Classify a status for a given method
pub fn classify(method: Method, status: u16) -> Classification {
    match status {
        204 if method.expects_body() => Classification::Retry,
        403 => Classification::Forbidden,
        429 => Classification::Retry,
        500 | 502 | 503 => Classification::ServerError,
        _ => Classification::Accept,
    }
}

/// Executes requests against the admin API with the retry policy applied
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        debug!(?policy, "RequestExecutor::new: called");
        Self { transport, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run one logical call; non-2xx statuses that are not terminal come back as `Ok`
    pub async fn execute(&self, request: &HttpRequest, credentials: &Credentials) -> Result<HttpResponse, RemoteError> {
        debug!(method = %request.method, url = %request.url, "RequestExecutor::execute: called");
        let mut retries: u32 = 0;

        loop {
            let reason = match self.transport.send(request, credentials).await {
                Err(e) => {
                    warn!(method = %request.method, url = %request.url, error = %e, "Transport error");
                    format!("transport error: {}", e)
                }
                Ok(response) => match classify(request.method, response.status) {
                    Classification::Accept => {
                        debug!(status = response.status, "RequestExecutor::execute: accepted");
                        return Ok(response);
                    }
                    Classification::Retry => {
                        warn!(
                            method = %request.method,
                            url = %request.url,
                            status = response.status,
                            "Transient response"
                        );
                        format!("HTTP {}", response.status)
                    }
                    Classification::Forbidden => {
                        error!(method = %request.method, url = %request.url, "Received 403 Forbidden");
                        return Err(RemoteError::Forbidden {
                            method: request.method,
                            url: request.url.to_string(),
                        });
                    }
                    Classification::ServerError => {
                        error!(
                            method = %request.method,
                            url = %request.url,
                            status = response.status,
                            "Received server error, failing out"
                        );
                        return Err(RemoteError::Server {
                            status: response.status,
                            method: request.method,
                            url: request.url.to_string(),
                            body: response.text().into_owned(),
                        });
                    }
                },
            };

            if retries >= self.policy.max_retries {
                warn!(method = %request.method, url = %request.url, retries, "Exceeded retry limit");
                return Err(RemoteError::RetriesExhausted {
                    method: request.method,
                    url: request.url.to_string(),
                    attempts: retries + 1,
                    last: reason,
                });
            }

            retries += 1;
            debug!(retries, backoff = ?self.policy.backoff, %reason, "RequestExecutor::execute: backing off");
            tokio::time::sleep(self.policy.backoff).await;
        }
    }

    /// Stream a local file as the request body; returns the final status
    pub async fn upload(&self, url: Url, path: &Path, credentials: &Credentials) -> Result<u16, RemoteError> {
        debug!(%url, path = %path.display(), "RequestExecutor::upload: called");
        let response = self.execute(&HttpRequest::upload(url, path), credentials).await?;
        Ok(response.status)
    }

    /// Stream a successful response body into a local file; returns the final status
    pub async fn download(&self, url: Url, path: &Path, credentials: &Credentials) -> Result<u16, RemoteError> {
        debug!(%url, path = %path.display(), "RequestExecutor::download: called");
        let response = self.execute(&HttpRequest::download(url, path), credentials).await?;
        Ok(response.status)
    }
}
