//! Resilience building blocks shared across the workspace.

pub mod retry;

pub use retry::{
    BackoffStrategy, Jitter, PredicateRetry, RetryConfig, RetryDecision, RetryError,
    RetryExecutor, RetryPolicy, RetryResult,
};
