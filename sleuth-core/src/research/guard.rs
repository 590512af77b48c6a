//! Per-call deadlines and transient-error retry for capability ports.
//!
//! A hung call turns into `ServiceError::Timeout`, which every stage treats
//! like any other failure and routes to its fallback.

use super::ports::{SearchProvider, TextGenerator};
use super::records::SearchResult;
use crate::config::RetryConfig;
use crate::error::ServiceError;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Deadline and retry policy applied to every remote call.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl CallPolicy {
    pub fn new(timeout: Duration, retry: RetryConfig) -> Self {
        Self { timeout, retry }
    }

    /// Run `operation` under the deadline, retrying transient failures with
    /// exponential backoff. Malformed responses return immediately.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T, ServiceError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut attempt = 0;
        loop {
            let err = match tokio::time::timeout(self.timeout, operation()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => ServiceError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                },
            };

            if !err.is_transient() || attempt >= self.retry.max_retries {
                return Err(err);
            }

            let backoff_ms = compute_backoff(&self.retry, attempt, &err);
            warn!(
                attempt = attempt + 1,
                max = self.retry.max_retries,
                backoff_ms,
                error = %err,
                "Retrying after transient error"
            );
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            attempt += 1;
        }
    }
}

/// Delay before the next attempt. A rate-limited call waits at least as long
/// as the server asked.
fn compute_backoff(config: &RetryConfig, attempt: u32, err: &ServiceError) -> u64 {
    let computed = exponential_backoff(config, attempt);
    match err {
        ServiceError::RateLimited { retry_after_secs } => {
            retry_after_secs.saturating_mul(1000).max(computed)
        }
        _ => computed,
    }
}

/// Exponential backoff with optional jitter, capped at `max_backoff_ms`.
fn exponential_backoff(config: &RetryConfig, attempt: u32) -> u64 {
    let base = config.initial_backoff_ms as f64 * config.backoff_multiplier.powi(attempt as i32);
    let capped = base.min(config.max_backoff_ms as f64) as u64;
    if config.jitter {
        let jitter = (capped as f64 * 0.25 * rand_simple()) as u64;
        capped + jitter
    } else {
        capped
    }
}

/// Cheap pseudo-random fraction in [0, 1) for jitter.
fn rand_simple() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// `TextGenerator` wrapped in a `CallPolicy`.
pub struct GuardedGenerator {
    inner: Arc<dyn TextGenerator>,
    policy: CallPolicy,
}

impl GuardedGenerator {
    pub fn new(inner: Arc<dyn TextGenerator>, policy: CallPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl TextGenerator for GuardedGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, ServiceError> {
        self.policy
            .call(|| self.inner.generate(system, prompt))
            .await
    }
}

/// `SearchProvider` wrapped in a `CallPolicy`.
pub struct GuardedSearch {
    inner: Arc<dyn SearchProvider>,
    policy: CallPolicy,
}

impl GuardedSearch {
    pub fn new(inner: Arc<dyn SearchProvider>, policy: CallPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl SearchProvider for GuardedSearch {
    async fn search(&self, query: &str) -> Result<SearchResult, ServiceError> {
        self.policy.call(|| self.inner.search(query)).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
