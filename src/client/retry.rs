// src/client/retry.rs

use anyhow::{anyhow, Result};
use rand::Rng;
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::config::RetryConfig;

/// Outcome of one failed attempt.
#[derive(Debug)]
pub enum AttemptError {
    /// Worth another try: transport failure, 408, 429 or 5xx.
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

impl AttemptError {
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let err = anyhow!("HTTP error: {} {}", status, body.trim());
        if is_retryable_status(status) {
            AttemptError::Retryable(err)
        } else {
            AttemptError::Fatal(err)
        }
    }

    pub fn into_inner(self) -> anyhow::Error {
        match self {
            AttemptError::Retryable(e) | AttemptError::Fatal(e) => e,
        }
    }
}

impl From<reqwest::Error> for AttemptError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) if !is_retryable_status(status) => AttemptError::Fatal(e.into()),
            // decoding a successful body will not improve on retry
            None if e.is_decode() => AttemptError::Fatal(e.into()),
            _ => AttemptError::Retryable(e.into()),
        }
    }
}

pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(c: &RetryConfig) -> Self {
        Self {
            max_attempts: c.max_attempts.max(1),
            base_delay: Duration::from_millis(c.base_delay_ms),
            max_delay: Duration::from_millis(c.max_delay_ms),
            jitter: c.jitter,
        }
    }
}

impl RetryPolicy {
    /// `min(max_delay, base_delay · 2^(attempt−1))`, attempts counted from 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Backoff plus uniform jitter in `[0, backoff/2]` when enabled.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let half = base.as_millis() as u64 / 2;
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=half))
    }
}

/// Run `op` until it succeeds, fails fatally, or `max_attempts` is used up.
pub async fn with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(AttemptError::Retryable(e)) if attempt < policy.max_attempts => {
                let delay = policy.delay(attempt);
                warn!(attempt, ?delay, error = %e, "request failed, retrying");
                sleep(delay).await;
            }
            Err(err) => {
                let e = err.into_inner();
                return Err(e.context(format!("giving up after {} attempt(s)", attempt)));
            }
        }
    }
}
