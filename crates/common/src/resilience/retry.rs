//! Generic retry executor with exponential backoff and jitter.
//!
//! Wraps a unit of async work that may fail with a classified error. The
//! caller supplies a [`RetryPolicy`] deciding which errors are worth
//! retrying; everything else propagates immediately without consuming an
//! attempt. Delays grow exponentially from a base, are capped, and carry
//! random jitter to avoid synchronized retry storms across tenants.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors produced by the retry executor itself.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// All retry attempts have been exhausted.
    #[error("all retry attempts exhausted after {attempts} tries")]
    AttemptsExhausted { attempts: u32, source: E },

    /// The operation failed with a non-retryable error.
    #[error("operation failed with non-retryable error: {source}")]
    NonRetryable { source: E },
}

impl<E> RetryError<E> {
    /// Unwrap the underlying operation error.
    pub fn into_source(self) -> E {
        match self {
            Self::AttemptsExhausted { source, .. } | Self::NonRetryable { source } => source,
        }
    }
}

/// Result type for retry operations.
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Decision for whether to retry an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry with the configured backoff delay.
    Retry,
    /// Retry after a caller-supplied delay (e.g. a Retry-After header).
    RetryAfter(Duration),
    /// Don't retry; propagate immediately.
    Stop,
}

/// Trait for determining whether an error should be retried.
pub trait RetryPolicy<E> {
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Predicate-based retry policy.
pub struct PredicateRetry<F> {
    predicate: F,
}

impl<F> PredicateRetry<F> {
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F, E> RetryPolicy<E> for PredicateRetry<F>
where
    F: Fn(&E) -> bool,
{
    fn should_retry(&self, error: &E, _attempt: u32) -> RetryDecision {
        if (self.predicate)(error) {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}

/// Backoff strategy for calculating retry delays.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries.
    Fixed(Duration),
    /// Exponential backoff: `base_delay * 2^attempt`, capped at `max_delay`.
    Exponential { base_delay: Duration, max_delay: Duration },
}

impl BackoffStrategy {
    /// Calculate the delay for the given zero-based attempt.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { base_delay, max_delay } => {
                let exp = 2u64.saturating_pow(attempt.min(16));
                let delay_ms = base_delay.as_millis() as u64 * exp;
                Duration::from_millis(delay_ms).min(*max_delay)
            }
        }
    }
}

/// Jitter applied to a computed delay.
#[derive(Debug, Clone, PartialEq)]
pub enum Jitter {
    None,
    /// Random offset within `±ratio` of the computed delay.
    Proportional(f64),
}

impl Jitter {
    /// Apply jitter to the calculated delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            Self::None => delay,
            Self::Proportional(ratio) => {
                let span_ms = (delay.as_millis() as f64 * ratio) as i64;
                if span_ms == 0 {
                    return delay;
                }
                let offset = rand::thread_rng().gen_range(-span_ms..=span_ms);
                let jittered = delay.as_millis() as i64 + offset;
                Duration::from_millis(jittered.max(0) as u64)
            }
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
    pub jitter: Jitter,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: BackoffStrategy::Exponential {
                base_delay: Duration::from_millis(1_000),
                max_delay: Duration::from_secs(60),
            },
            jitter: Jitter::Proportional(0.1),
        }
    }
}

impl RetryConfig {
    /// Fixed-delay configuration, mostly useful in tests.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, backoff: BackoffStrategy::Fixed(delay), jitter: Jitter::None }
    }

    /// Exponential configuration without jitter.
    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::Exponential { base_delay, max_delay },
            jitter: Jitter::None,
        }
    }

    pub fn with_jitter(mut self, ratio: f64) -> Self {
        self.jitter = Jitter::Proportional(ratio);
        self
    }
}

/// The retry executor: one policy object, reused by every remote-call site.
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Execute an operation with retry logic.
    ///
    /// Non-retryable errors propagate on the attempt they occur; retryable
    /// errors sleep through the backoff schedule until `max_attempts` is
    /// reached.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    let decision = self.policy.should_retry(&error, attempt);

                    if decision == RetryDecision::Stop {
                        debug!(error = %error, "non-retryable error, propagating");
                        return Err(RetryError::NonRetryable { source: error });
                    }

                    if attempt + 1 >= self.config.max_attempts {
                        warn!(
                            attempts = attempt + 1,
                            error = %error,
                            "retry attempts exhausted"
                        );
                        return Err(RetryError::AttemptsExhausted {
                            attempts: attempt + 1,
                            source: error,
                        });
                    }

                    let delay = match decision {
                        RetryDecision::RetryAfter(custom) => custom,
                        _ => self.config.jitter.apply(self.config.backoff.calculate_delay(attempt)),
                    };

                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "operation failed, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
