//! Resilience
//!
//! Retry policy for outbound calls.

pub mod retry;

pub use retry::{RetryConfig, RetryPolicy, DEFAULT_RETRY_CONFIG};
