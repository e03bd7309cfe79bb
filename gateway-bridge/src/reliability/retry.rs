//! Exponential backoff for retryable gateway failures.

use std::time::Duration;

use tracing::{debug, info, warn};

/// Retry schedule.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use gateway_bridge::reliability::RetryPolicy;
///
/// // Default policy: 3 attempts, 200ms initial delay, 5s max delay
/// let policy = RetryPolicy::default();
///
/// let patient = RetryPolicy {
///     max_attempts: 6,
///     initial_delay: Duration::from_millis(500),
///     max_delay: Duration::from_secs(30),
///     backoff_multiplier: 2.0,
/// };
/// assert!(patient.max_attempts > policy.max_attempts);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first; zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Default policy with `max_attempts` attempts.
    ///
    /// ```
    /// use gateway_bridge::reliability::RetryPolicy;
    ///
    /// assert_eq!(RetryPolicy::with_max_attempts(5).max_attempts, 5);
    /// ```
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self { max_attempts, ..Self::default() }
    }

    /// Delay after the failed attempt number `attempt` (zero-based),
    /// `initial_delay * multiplier ^ attempt` capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss, reason = "acceptable for duration calculations")]
        let delay_ms = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        #[allow(clippy::cast_precision_loss, reason = "acceptable for duration calculations")]
        let max_ms = self.max_delay.as_millis() as f64;
        if !delay_ms.is_finite() || delay_ms >= max_ms {
            return self.max_delay;
        }
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "delay_ms is finite and below max_delay"
        )]
        let delay = Duration::from_millis(delay_ms.max(0.0) as u64);
        delay.min(self.max_delay)
    }
}

/// Runs `operation` until it succeeds, fails with an error `is_retryable`
/// rejects, or the policy's attempts are used up.
///
/// # Examples
///
/// ```
/// use std::sync::{
///     Arc,
///     atomic::{AtomicU32, Ordering},
/// };
///
/// use gateway_bridge::{
///     error::{ApiCallErrorKind, GatewayError},
///     reliability::{RetryPolicy, retry_with_backoff},
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let calls = Arc::new(AtomicU32::new(0));
/// let result = retry_with_backoff(
///     &RetryPolicy::with_max_attempts(3),
///     || {
///         let calls = Arc::clone(&calls);
///         async move {
///             if calls.fetch_add(1, Ordering::Relaxed) == 0 {
///                 Err(GatewayError::api_call(ApiCallErrorKind::GatewayError, "busy"))
///             } else {
///                 Ok("captured")
///             }
///         }
///     },
///     GatewayError::is_retryable,
/// )
/// .await;
///
/// assert_eq!(result.unwrap(), "captured");
/// assert_eq!(calls.load(Ordering::Relaxed), 2);
/// # }
/// ```
///
/// # Errors
///
/// Returns the last error once retrying stops.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(attempt = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                let retryable = is_retryable(&error);
                warn!(
                    attempt = attempt + 1,
                    max_attempts,
                    retryable,
                    error = %error,
                    "Operation failed"
                );
                if !retryable || attempt + 1 >= max_attempts {
                    return Err(error);
                }
                let delay = policy.delay_for_attempt(attempt);
                debug!(delay_ms = delay.as_millis(), "Sleeping before retry");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
