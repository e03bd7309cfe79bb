//! Caller-side retry support.
//!
//! The dispatcher performs exactly one attempt per call. Applications that
//! want retries wrap dispatch with [`retry_with_backoff`], which retries only
//! errors the supplied predicate accepts, e.g. [`GatewayError::is_retryable`].
//!
//! [`GatewayError::is_retryable`]: crate::error::GatewayError::is_retryable

mod retry;

pub use retry::{RetryPolicy, retry_with_backoff};
