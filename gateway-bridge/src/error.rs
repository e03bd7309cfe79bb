//! Error types for the gateway bridge.
//!
//! Every fallible operation in this crate returns [`Result<T>`], whose error
//! type is the closed [`GatewayError`] taxonomy. Errors always name the
//! offending key, code or operation so callers can react precisely.
//!
//! # Error Categories
//!
//! - **Programmer errors** ([`GatewayError::UnknownOperation`]): the operation
//!   type and modifier combination has no registered schema
//! - **Recoverable configuration errors** ([`GatewayError::MissingConfiguration`],
//!   [`GatewayError::ConfigurationValidation`]): supply or fix keys and retry
//! - **API call errors** ([`GatewayError::ApiCall`], [`GatewayError::ExpiredToken`]):
//!   classified by [`ApiCallErrorKind`] so callers can pick retry, abort or refresh
//! - **Lookup errors** ([`GatewayError::CodeMessage`]): a single code lookup failed
//!
//! # Examples
//!
//! ```
//! use gateway_bridge::error::{GatewayError, Result};
//!
//! fn require_https(url: &str) -> Result<&str> {
//!     if !url.starts_with("https://") {
//!         return Err(GatewayError::Config("base_url must use HTTPS".to_owned()));
//!     }
//!     Ok(url)
//! }
//!
//! assert!(require_https("http://gateway.example.com").is_err());
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for gateway bridge operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Classification of a failed gateway call.
///
/// Derived from the transport outcome and HTTP status, never guessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiCallErrorKind {
    /// Transport-level failure (connection refused, timeout). Always safe to retry.
    NetworkFailure,
    /// Expired or rejected token. Refresh the token, then redispatch.
    AuthFailure,
    /// The gateway rejected the payload. Not retryable without changing input.
    ValidationFailure,
    /// Gateway-side failure (5xx or throttling). Retry with backoff.
    GatewayError,
}

impl ApiCallErrorKind {
    /// Returns true when the same request may succeed if sent again unchanged.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::NetworkFailure | Self::GatewayError)
    }

    /// Stable identifier used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NetworkFailure => "network_failure",
            Self::AuthFailure => "auth_failure",
            Self::ValidationFailure => "validation_failure",
            Self::GatewayError => "gateway_error",
        }
    }
}

impl fmt::Display for ApiCallErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of a single code message lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeMessageError {
    /// The code is not exactly eight ASCII digits.
    #[error("code '{code}' must be exactly 8 digits")]
    InvalidFormat {
        /// Code as supplied by the caller.
        code: String,
    },

    /// One of the derived sub-codes has no entry in the dataset.
    #[error("no {tier} entry '{sub_code}' for code '{code}'")]
    UnknownCode {
        /// Full eight-digit code.
        code: String,
        /// Tier that failed (`state`, `module` or `parameter`).
        tier: &'static str,
        /// Sub-code derived for that tier.
        sub_code: String,
    },

    /// The dataset carries no text for this language.
    #[error("unsupported language '{language}'")]
    UnsupportedLanguage {
        /// Language tag as supplied by the caller.
        language: String,
    },

    /// The dataset itself could not be loaded.
    #[error("invalid code message dataset: {0}")]
    Dataset(String),
}

/// Errors that can occur in the gateway bridge.
///
/// # Error Recovery
///
/// - [`UnknownOperation`](Self::UnknownOperation): fix the calling code
/// - [`MissingConfiguration`](Self::MissingConfiguration): supply the listed keys
/// - [`ConfigurationValidation`](Self::ConfigurationValidation): fix the named key
/// - [`ApiCall`](Self::ApiCall): consult [`ApiCallErrorKind`]
/// - [`ExpiredToken`](Self::ExpiredToken): obtain a new token and redispatch
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No schema is registered for this operation type and modifiers.
    #[error("no schema registered for operation {operation} with modifiers {modifiers}")]
    UnknownOperation {
        /// Operation type name.
        operation: String,
        /// Modifier combination, rendered for diagnostics.
        modifiers: String,
    },

    /// Required configuration keys are absent.
    ///
    /// `missing` lists exactly the unmet keys, in schema declaration order.
    #[error("operation {operation} is missing required configuration keys: {}", .missing.join(", "))]
    MissingConfiguration {
        /// Operation type name.
        operation: String,
        /// Unmet required keys.
        missing: Vec<String>,
    },

    /// A configuration value does not have the expected type or format.
    #[error("invalid value for '{key}': expected {expected}")]
    ConfigurationValidation {
        /// Offending configuration key.
        key: String,
        /// Human-readable description of the accepted format.
        expected: String,
    },

    /// A gateway call failed.
    #[error("gateway call failed ({kind}{}): {message}", status_suffix(.status, .code))]
    ApiCall {
        /// Failure classification.
        kind: ApiCallErrorKind,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Gateway response code carried by the body, if any.
        code: Option<String>,
        /// Diagnostic message.
        message: String,
    },

    /// The access token was already expired when dispatch was attempted.
    #[error("access token expired at {expired_at}")]
    ExpiredToken {
        /// Instant the token stopped being valid.
        expired_at: DateTime<Utc>,
    },

    /// Code message lookup failed.
    #[error(transparent)]
    CodeMessage(#[from] CodeMessageError),

    /// Client configuration is invalid.
    #[error("invalid client configuration: {0}")]
    Config(String),

    /// A caller-supplied argument was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Payload serialization or response parsing failed.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[allow(clippy::ref_option, reason = "called with borrowed error fields")]
fn status_suffix(status: &Option<u16>, code: &Option<String>) -> String {
    match (status, code) {
        (Some(status), Some(code)) => format!(", status {status}, code {code}"),
        (Some(status), None) => format!(", status {status}"),
        (None, Some(code)) => format!(", code {code}"),
        (None, None) => String::new(),
    }
}

impl GatewayError {
    /// Shorthand for an [`ApiCall`](Self::ApiCall) error without status or code.
    pub fn api_call(kind: ApiCallErrorKind, message: impl Into<String>) -> Self {
        Self::ApiCall { kind, status: None, code: None, message: message.into() }
    }

    /// Returns the API failure classification, if this error came from a gateway call.
    ///
    /// An expired token is reported as [`ApiCallErrorKind::AuthFailure`].
    #[must_use]
    pub fn api_call_kind(&self) -> Option<ApiCallErrorKind> {
        match self {
            Self::ApiCall { kind, .. } => Some(*kind),
            Self::ExpiredToken { .. } => Some(ApiCallErrorKind::AuthFailure),
            _ => None,
        }
    }

    /// Returns true when retrying the same call unchanged may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.api_call_kind().is_some_and(ApiCallErrorKind::is_retryable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_configuration_lists_keys() {
        let error = GatewayError::MissingConfiguration {
            operation: "DIRECT_PAYMENT".to_owned(),
            missing: vec!["payment.amount".to_owned(), "payment.currency".to_owned()],
        };
        assert_eq!(
            error.to_string(),
            "operation DIRECT_PAYMENT is missing required configuration keys: payment.amount, \
             payment.currency"
        );
    }

    #[test]
    fn test_validation_error_names_key() {
        let error = GatewayError::ConfigurationValidation {
            key: "payment.card.card.expiry".to_owned(),
            expected: "MM/YY or MM/YYYY".to_owned(),
        };
        assert!(error.to_string().contains("payment.card.card.expiry"));
        assert!(error.to_string().contains("MM/YY"));
    }

    #[test]
    fn test_api_call_display_with_status_and_code() {
        let error = GatewayError::ApiCall {
            kind: ApiCallErrorKind::ValidationFailure,
            status: Some(400),
            code: Some("01002003".to_owned()),
            message: "rejected".to_owned(),
        };
        assert_eq!(
            error.to_string(),
            "gateway call failed (validation_failure, status 400, code 01002003): rejected"
        );
    }

    #[test]
    fn test_api_call_display_bare() {
        let error = GatewayError::api_call(ApiCallErrorKind::NetworkFailure, "timed out");
        assert_eq!(error.to_string(), "gateway call failed (network_failure): timed out");
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ApiCallErrorKind::NetworkFailure.is_retryable());
        assert!(ApiCallErrorKind::GatewayError.is_retryable());
        assert!(!ApiCallErrorKind::AuthFailure.is_retryable());
        assert!(!ApiCallErrorKind::ValidationFailure.is_retryable());
    }

    #[test]
    fn test_expired_token_is_auth_failure() {
        let error = GatewayError::ExpiredToken { expired_at: Utc::now() };
        assert_eq!(error.api_call_kind(), Some(ApiCallErrorKind::AuthFailure));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_non_api_errors_have_no_kind() {
        let error = GatewayError::Config("bad".to_owned());
        assert_eq!(error.api_call_kind(), None);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_code_message_error_converts() {
        let error: GatewayError =
            CodeMessageError::InvalidFormat { code: "0000000".to_owned() }.into();
        assert_eq!(error.to_string(), "code '0000000' must be exactly 8 digits");
    }
}
