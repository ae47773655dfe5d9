//! Retry Logic for Supervisor Runs
//!
//! The supervisor core never retries; the batch driver does. Only failures
//! classified as transient are retried, with exponential backoff and optional
//! jitter. A rate-limit hint from the provider raises the delay to at least
//! the hinted value.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use supervisor::{RunFailure, TransientError};
use tracing::{debug, info, warn};

/// Classification of errors for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// May succeed on retry (provider down, rate limits, timeouts)
    Transient,

    /// Will fail again (routing errors, run limits, bad input)
    Permanent,
}

/// Errors the retry loop knows how to classify
pub trait Retryable {
    fn classify(&self) -> ErrorClass;

    /// Minimum delay requested by the failing service
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for TransientError {
    fn classify(&self) -> ErrorClass {
        ErrorClass::Transient
    }

    fn retry_after(&self) -> Option<Duration> {
        TransientError::retry_after(self)
    }
}

impl Retryable for RunFailure {
    fn classify(&self) -> ErrorClass {
        if self.error.is_transient() {
            ErrorClass::Transient
        } else {
            ErrorClass::Permanent
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match &self.error {
            supervisor::RunError::Transient(transient) => transient.retry_after(),
            _ => None,
        }
    }
}

/// Backoff policy for transient failures.
///
/// The delay before retry `n` is `initial_backoff_ms * backoff_multiplier^n`,
/// stretched by a random fraction of at most `jitter` and capped at
/// `max_backoff_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Retries after the first attempt; `0` disables retrying
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    /// Largest random stretch as a fraction of the delay; `0` for exact delays
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Delay before the first retry
    pub fn with_backoff(mut self, initial: Duration) -> Self {
        self.initial_backoff_ms = u64::try_from(initial.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }

    /// Delay before retry number `retry`, counted from zero
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let growth = self.backoff_multiplier.powi(i32::try_from(retry).unwrap_or(i32::MAX));
        let mut millis = self.initial_backoff_ms as f64 * growth;
        if self.jitter > 0.0 {
            millis *= 1.0 + rand::thread_rng().gen_range(0.0..=self.jitter);
        }
        // f64 to u64 saturates, so an overflowing growth lands on the cap
        Duration::from_millis((millis as u64).min(self.max_backoff_ms))
    }
}

/// Execute an operation, retrying transient failures.
///
/// Returns the final result and the number of attempts made.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut f: F,
) -> (Result<T, E>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            info!(
                operation = operation_name,
                attempt,
                max_retries = config.max_retries,
                "Retrying operation"
            );
        }

        let error = match f().await {
            Ok(result) => return (Ok(result), attempt + 1),
            Err(error) => error,
        };

        let class = error.classify();
        debug!(
            operation = operation_name,
            attempt,
            %error,
            classification = ?class,
            "Operation failed"
        );

        if class == ErrorClass::Permanent {
            return (Err(error), attempt + 1);
        }
        if attempt >= config.max_retries {
            warn!(
                operation = operation_name,
                max_retries = config.max_retries,
                %error,
                "All retry attempts exhausted"
            );
            return (Err(error), attempt + 1);
        }

        let delay = match error.retry_after() {
            Some(hint) => config.backoff_delay(attempt).max(hint),
            None => config.backoff_delay(attempt),
        };
        warn!(
            operation = operation_name,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Transient error, will retry after delay"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
