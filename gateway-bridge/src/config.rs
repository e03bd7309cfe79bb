//! Client configuration types.
//!
//! This module defines the TOML-deserializable configuration of a
//! [`GatewayClient`](crate::GatewayClient): which gateway environment to talk
//! to, endpoint prefixes, dispatch timeout, HTTP transport tuning and payload
//! field mappings.
//!
//! ```
//! use gateway_bridge::config::{ClientConfig, Environment};
//!
//! let config = ClientConfig::from_toml_str(
//!     r#"
//!     environment = "production"
//!     dispatch_timeout_secs = 20
//!
//!     [transport]
//!     http_version = "http2"
//!
//!     [field_mappings.payload]
//!     "order.reference" = "merchant.order_id"
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.environment, Environment::Production);
//! assert_eq!(config.base_url().unwrap().as_str(), "https://api.gateway.example/");
//! ```

use std::{collections::HashMap, fmt, path::Path, time::Duration};

use serde::Deserialize;
use url::Url;
use zeroize::Zeroizing;

use crate::{
    error::{GatewayError, Result},
    transport::HttpConfig,
};

/// Sandbox API base URL.
pub const SANDBOX_BASE_URL: &str = "https://sandbox.api.gateway.example";

/// Production API base URL.
pub const PRODUCTION_BASE_URL: &str = "https://api.gateway.example";

/// Gateway environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Test environment; no funds move.
    #[default]
    Sandbox,
    /// Live environment.
    Production,
    /// Explicit `base_url`, e.g. a regional endpoint.
    Custom,
}

/// Root client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Gateway environment.
    #[serde(default)]
    pub environment: Environment,

    /// Base URL; required when `environment = "custom"`, ignored otherwise.
    #[serde(default)]
    pub base_url: Option<String>,

    /// API version prefix prepended to operation endpoints.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Path of the credential exchange endpoint.
    #[serde(default = "default_token_path")]
    pub token_path: String,

    /// Upper bound for each gateway call, in seconds.
    #[serde(default = "default_dispatch_timeout_secs")]
    pub dispatch_timeout_secs: u64,

    /// HTTP transport configuration.
    #[serde(default)]
    pub transport: HttpConfig,

    /// Payload field mappings.
    #[serde(default)]
    pub field_mappings: FieldMappingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            base_url: None,
            api_prefix: default_api_prefix(),
            token_path: default_token_path(),
            dispatch_timeout_secs: default_dispatch_timeout_secs(),
            transport: HttpConfig::default(),
            field_mappings: FieldMappingConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if parsing or validation fails.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| GatewayError::Config(format!("invalid TOML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or its content is invalid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| GatewayError::Config(format!("cannot read config file: {e}")))?;
        Self::from_toml_str(&content)
    }

    /// Validates the configuration.
    ///
    /// Checks that:
    /// - the base URL is HTTPS and not a loopback address
    /// - `api_prefix` and `token_path` are clean absolute paths
    /// - `dispatch_timeout_secs` is within 1-300
    /// - transport settings and field mappings are sound
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;
        if !self.api_prefix.is_empty() {
            validate_endpoint_path("api_prefix", &self.api_prefix)?;
        }
        validate_endpoint_path("token_path", &self.token_path)?;
        if self.dispatch_timeout_secs == 0 || self.dispatch_timeout_secs > 300 {
            return Err(GatewayError::Config(
                "dispatch_timeout_secs must be between 1 and 300".to_owned(),
            ));
        }
        self.transport.validate()?;
        self.field_mappings.validate()
    }

    /// Resolves the API base URL for the configured environment.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if a custom URL is missing, malformed,
    /// not HTTPS, or points to a loopback host.
    pub fn base_url(&self) -> Result<Url> {
        let raw = match self.environment {
            Environment::Sandbox => SANDBOX_BASE_URL,
            Environment::Production => PRODUCTION_BASE_URL,
            Environment::Custom => self.base_url.as_deref().ok_or_else(|| {
                GatewayError::Config("base_url is required for the custom environment".to_owned())
            })?,
        };
        parse_base_url(raw)
    }

    /// URL of the credential exchange endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if the base URL is invalid.
    pub fn token_url(&self) -> Result<Url> {
        let base = self.base_url()?;
        base.join(&self.token_path).map_err(|e| {
            GatewayError::Config(format!("invalid token_path '{}': {e}", self.token_path))
        })
    }

    /// Dispatch timeout as Duration.
    #[must_use]
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| GatewayError::Config(format!("invalid base_url '{raw}': {e}")))?;

    // Must be HTTPS
    if url.scheme() != "https" {
        return Err(GatewayError::Config(format!(
            "base_url must use HTTPS, got: {}",
            url.scheme()
        )));
    }

    // Check for localhost/loopback
    if let Some(host) = url.host_str() {
        let host_lower = host.to_lowercase();
        if host_lower == "localhost"
            || host_lower == "::1"
            || host_lower == "[::1]"
            || host_lower.starts_with("127.")
        {
            return Err(GatewayError::Config(format!(
                "base_url must not be localhost or loopback: {host}"
            )));
        }
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(GatewayError::Config(format!(
            "base_url must not carry a query or fragment: {raw}"
        )));
    }

    Ok(url)
}

/// Validates an endpoint path for security issues.
fn validate_endpoint_path(name: &str, path: &str) -> Result<()> {
    // Check for path traversal
    if path.contains("..") {
        return Err(GatewayError::Config(format!(
            "{name} contains path traversal sequence '..': {path}"
        )));
    }

    // Check for double slashes (can be used for path confusion)
    if path.contains("//") {
        return Err(GatewayError::Config(format!("{name} contains double slash '//': {path}")));
    }

    // Must start with /
    if !path.starts_with('/') {
        return Err(GatewayError::Config(format!("{name} must start with '/': {path}")));
    }

    if path.contains(['?', '#']) {
        return Err(GatewayError::Config(format!(
            "{name} must not carry a query or fragment: {path}"
        )));
    }

    Ok(())
}

/// Payload field name mappings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FieldMappingConfig {
    /// Configuration path -> payload path.
    #[serde(default)]
    pub payload: HashMap<String, String>,
}

/// Forbidden field names that could indicate injection attempts.
const FORBIDDEN_FIELD_NAMES: &[&str] = &["__proto__", "constructor", "prototype"];

impl FieldMappingConfig {
    /// Validates field mapping paths.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if any path is empty, has an empty
    /// segment, contains a null byte, or uses a forbidden segment name.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in &self.payload {
            validate_field_path("field mapping key", key)?;
            validate_field_path("field mapping value", value)?;
        }
        Ok(())
    }
}

fn validate_field_path(context: &str, path: &str) -> Result<()> {
    if path.contains('\0') {
        return Err(GatewayError::Config(format!("{context} contains null byte")));
    }
    for segment in path.split('.') {
        if segment.is_empty() {
            return Err(GatewayError::Config(format!(
                "{context} '{path}' has an empty path segment"
            )));
        }
        if FORBIDDEN_FIELD_NAMES.contains(&segment) {
            return Err(GatewayError::Config(format!(
                "{context} '{path}' contains forbidden name: {segment}"
            )));
        }
    }
    Ok(())
}

/// Merchant credentials exchanged for access tokens.
///
/// The api key is wiped from memory on drop and never printed.
#[derive(Clone)]
pub struct MerchantCredentials {
    merchant_id: String,
    api_key: Zeroizing<String>,
}

impl MerchantCredentials {
    /// Creates credentials.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidInput`] if either value is empty, or the
    /// merchant id contains `:` or control characters.
    pub fn new(merchant_id: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let merchant_id = merchant_id.into();
        let api_key = Zeroizing::new(api_key.into());

        if merchant_id.is_empty()
            || merchant_id.contains(':')
            || merchant_id.chars().any(char::is_control)
        {
            return Err(GatewayError::InvalidInput(
                "merchant_id must be non-empty without ':' or control characters".to_owned(),
            ));
        }
        if api_key.is_empty() {
            return Err(GatewayError::InvalidInput("api_key must not be empty".to_owned()));
        }
        Ok(Self { merchant_id, api_key })
    }

    /// Reads credentials from two environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if a variable is unset or not valid
    /// Unicode, or [`GatewayError::InvalidInput`] if a value is rejected.
    pub fn from_env(merchant_id_var: &str, api_key_var: &str) -> Result<Self> {
        let read = |name: &str| {
            std::env::var(name).map_err(|e| {
                GatewayError::Config(format!("environment variable {name} is unavailable: {e}"))
            })
        };
        Self::new(read(merchant_id_var)?, read(api_key_var)?)
    }

    /// Merchant identifier.
    #[must_use]
    pub fn merchant_id(&self) -> &str {
        &self.merchant_id
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for MerchantCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerchantCredentials")
            .field("merchant_id", &self.merchant_id)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

fn default_api_prefix() -> String {
    "/v1".to_owned()
}

fn default_token_path() -> String {
    "/oauth/token".to_owned()
}

fn default_dispatch_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid_sandbox() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.environment, Environment::Sandbox);
        assert_eq!(config.base_url().unwrap().as_str(), "https://sandbox.api.gateway.example/");
        assert_eq!(config.dispatch_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_token_url() {
        let config = ClientConfig::default();
        assert_eq!(
            config.token_url().unwrap().as_str(),
            "https://sandbox.api.gateway.example/oauth/token"
        );
    }

    #[test]
    fn test_custom_environment_requires_base_url() {
        let err = ClientConfig::from_toml_str("environment = \"custom\"").unwrap_err();
        assert!(err.to_string().contains("base_url is required"));
    }

    #[test]
    fn test_custom_environment_base_url() {
        let config = ClientConfig::from_toml_str(
            r#"
            environment = "custom"
            base_url = "https://eu.gateway.example"
            "#,
        )
        .unwrap();
        assert_eq!(config.base_url().unwrap().host_str(), Some("eu.gateway.example"));
    }

    #[test]
    fn test_rejects_http_base_url() {
        let config = ClientConfig {
            environment: Environment::Custom,
            base_url: Some("http://gateway.example".to_owned()),
            ..ClientConfig::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("HTTPS"));
    }

    #[test]
    fn test_rejects_loopback_base_url() {
        for url in ["https://localhost", "https://127.0.0.1", "https://[::1]"] {
            let config = ClientConfig {
                environment: Environment::Custom,
                base_url: Some(url.to_owned()),
                ..ClientConfig::default()
            };
            assert!(config.validate().is_err(), "{url}");
        }
    }

    #[test]
    fn test_rejects_path_traversal() {
        let config = ClientConfig { api_prefix: "/v1/../admin".to_owned(), ..ClientConfig::default() };
        assert!(config.validate().unwrap_err().to_string().contains("traversal"));

        let config = ClientConfig { token_path: "oauth/token".to_owned(), ..ClientConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_api_prefix_is_allowed() {
        let config = ClientConfig { api_prefix: String::new(), ..ClientConfig::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dispatch_timeout_bounds() {
        let config = ClientConfig { dispatch_timeout_secs: 0, ..ClientConfig::default() };
        assert!(config.validate().is_err());
        let config = ClientConfig { dispatch_timeout_secs: 301, ..ClientConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_field_mapping_validation() {
        let mut payload = HashMap::new();
        payload.insert("order.reference".to_owned(), "merchant..id".to_owned());
        let mappings = FieldMappingConfig { payload };
        assert!(mappings.validate().is_err());

        let mut payload = HashMap::new();
        payload.insert("customer.__proto__".to_owned(), "x".to_owned());
        assert!(FieldMappingConfig { payload }.validate().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(ClientConfig::from_toml_str("invalid toml {{{").is_err());
    }

    #[test]
    fn test_credentials_debug_redacts_api_key() {
        let credentials = MerchantCredentials::new("merchant-1", "sk_live_secret").unwrap();
        let debug = format!("{credentials:?}");
        assert!(debug.contains("merchant-1"));
        assert!(!debug.contains("sk_live_secret"));
        assert_eq!(credentials.api_key(), "sk_live_secret");
    }

    #[test]
    fn test_credentials_validation() {
        assert!(MerchantCredentials::new("", "key").is_err());
        assert!(MerchantCredentials::new("a:b", "key").is_err());
        assert!(MerchantCredentials::new("merchant", "").is_err());
    }

    #[test]
    fn test_credentials_from_missing_env() {
        let err = MerchantCredentials::from_env(
            "GATEWAY_BRIDGE_TEST_UNSET_MERCHANT",
            "GATEWAY_BRIDGE_TEST_UNSET_KEY",
        )
        .unwrap_err();
        assert!(err.to_string().contains("GATEWAY_BRIDGE_TEST_UNSET_MERCHANT"));
    }
}
