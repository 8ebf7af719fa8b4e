//! HTTP retrieval of schedule images and schedule JSON with bounded retries.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("Request timed out")]
    Timeout,
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<FetchError>,
    },
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// Source of raw payload bytes for a URL.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// Runs `attempt` until it succeeds or `policy.max_attempts` is reached,
/// sleeping `policy.retry_delay` between failures. Every failure is treated
/// as transient, including 4xx statuses.
pub async fn with_retries<F, Fut>(
    policy: &RetryPolicy,
    url: &str,
    mut attempt: F,
) -> Result<Bytes, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Bytes, FetchError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut number = 1;
    loop {
        match attempt(number).await {
            Ok(payload) => {
                debug!(url = %url, attempt = number, bytes = payload.len(), "Fetched payload.");
                return Ok(payload);
            }
            Err(e) if number < max_attempts => {
                warn!(url = %url, attempt = number, error = %e, "Fetch attempt failed, retrying.");
                if !policy.retry_delay.is_zero() {
                    tokio::time::sleep(policy.retry_delay).await;
                }
                number += 1;
            }
            Err(e) => {
                return Err(FetchError::Exhausted {
                    attempts: number,
                    last: Box::new(e),
                });
            }
        }
    }
}

pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(policy: RetryPolicy) -> Result<Self, FetchError> {
        let client = Client::builder()
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client, policy })
    }

    async fn attempt(&self, url: &str) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(self.policy.attempt_timeout)
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl ContentSource for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        with_retries(&self.policy, url, |_| self.attempt(url)).await
    }
}
