//! Operation building.
//!
//! [`OperationBuilder::build`] turns a [`ResolvedConfiguration`] into an
//! immutable [`Operation`]. Building is pure: it validates every value against
//! the format its schema declares, assembles the JSON payload through the
//! configured [`FieldMapper`], and binds the request URL. No network I/O
//! happens until the operation is dispatched.
//!
//! # Payload assembly
//!
//! Each configuration path is first mapped to a payload path, then split on
//! `.` into nested JSON objects. Keys substituted into the endpoint path are
//! left out of the body and the payload; they are carried by the request URL,
//! one percent-encoded segment each. Fixed values contributed by the operation variant
//! (for example `payment.rendering_mode`) are added last.
//!
//! ```
//! use gateway_bridge::{
//!     builder::OperationBuilder,
//!     configuration::ConfigurationMap,
//!     resolver::ConfigurationResolver,
//!     schema::{Modifiers, OperationType, SchemaRegistry},
//! };
//! use url::Url;
//!
//! let registry = SchemaRegistry::standard();
//! let config = ConfigurationMap::new()
//!     .with("payment.id", "pay_123")
//!     .with("payment.amount", "10.50");
//! let resolved = ConfigurationResolver::new(&registry)
//!     .resolve(&config, OperationType::Capture, Modifiers::NONE)
//!     .unwrap();
//!
//! let builder = OperationBuilder::new(Url::parse("https://sandbox.api.gateway.example").unwrap());
//! let operation = builder.build(&registry, &resolved).unwrap();
//!
//! assert_eq!(
//!     operation.request().url().as_str(),
//!     "https://sandbox.api.gateway.example/v1/payments/pay_123/captures"
//! );
//! assert_eq!(operation.payload()["payment"]["amount"], 1050);
//! ```

use std::{str::FromStr, sync::Arc, time::Duration};

use chrono::NaiveDate;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::{
    config::ClientConfig,
    configuration::ConfigValue,
    error::{GatewayError, Result},
    field_map::{ConfigurableFieldMapper, FieldMapper, IdentityFieldMapper},
    operation::{Operation, OperationRequest},
    resolver::ResolvedConfiguration,
    schema::{CARD_BRANDS, ConfigurationSchema, KeyFormat, KeySpec, SchemaRegistry},
    transport::Method,
};

/// Default API prefix prepended to endpoint paths.
pub const DEFAULT_API_PREFIX: &str = "/v1";

/// Default upper bound for a dispatched call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds [`Operation`]s from resolved configurations.
///
/// The builder holds only immutable settings and may be shared across threads.
#[derive(Debug, Clone)]
pub struct OperationBuilder {
    base_url: Url,
    api_prefix: String,
    timeout: Duration,
    field_mapper: Arc<dyn FieldMapper>,
}

impl OperationBuilder {
    /// Creates a builder targeting `base_url` with the default prefix,
    /// timeout and identity field mapping.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            api_prefix: DEFAULT_API_PREFIX.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            field_mapper: Arc::new(IdentityFieldMapper::new()),
        }
    }

    /// Creates a builder from client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if the base URL cannot be resolved.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let field_mapper: Arc<dyn FieldMapper> = if config.field_mappings.payload.is_empty() {
            Arc::new(IdentityFieldMapper::new())
        } else {
            Arc::new(ConfigurableFieldMapper::new(&config.field_mappings))
        };
        Ok(Self {
            base_url: config.base_url()?,
            api_prefix: config.api_prefix.clone(),
            timeout: config.dispatch_timeout(),
            field_mapper,
        })
    }

    /// Sets the API prefix.
    #[must_use]
    pub fn with_api_prefix(mut self, api_prefix: impl Into<String>) -> Self {
        self.api_prefix = api_prefix.into();
        self
    }

    /// Sets the timeout bound into every built request.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the field mapper.
    #[must_use]
    pub fn with_field_mapper(mut self, field_mapper: Arc<dyn FieldMapper>) -> Self {
        self.field_mapper = field_mapper;
        self
    }

    /// Base URL requests are bound to.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Validates `resolved` against its schema and builds the operation.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::UnknownOperation`] if `registry` has no schema for the
    ///   resolved operation
    /// - [`GatewayError::MissingConfiguration`] if `resolved` was produced by a
    ///   registry whose schema differs and keys are absent
    /// - [`GatewayError::ConfigurationValidation`] naming the first value, in
    ///   declaration order, with the wrong type or format, or a payload path
    ///   that collides with another
    pub fn build(
        &self,
        registry: &SchemaRegistry,
        resolved: &ResolvedConfiguration,
    ) -> Result<Operation> {
        let schema = registry.schema_for(resolved.operation(), resolved.modifiers())?;
        let values = resolved.values();

        let missing: Vec<String> = schema
            .required_keys()
            .filter(|key| !values.contains_key(key))
            .map(str::to_owned)
            .collect();
        if !missing.is_empty() {
            return Err(GatewayError::MissingConfiguration {
                operation: schema.operation().to_string(),
                missing,
            });
        }

        let mut body = Map::new();
        let mut path_values = Vec::new();

        for spec in schema.keys() {
            let Some(value) = values.get(&spec.path) else {
                continue;
            };
            let json = validate_value(spec, value)?;
            if schema.endpoint().is_path_parameter(&spec.path) {
                path_values.push((spec.path.as_str(), path_segment(&spec.path, &json)?));
            } else {
                let payload_path = self.field_mapper.payload_field(&spec.path);
                insert_path(&mut body, &payload_path, json, &spec.path)?;
            }
        }

        for (path, value) in schema.constants() {
            let payload_path = self.field_mapper.payload_field(path);
            insert_path(&mut body, &payload_path, constant_json(value), path)?;
        }

        let url = self.endpoint_url(schema, &path_values)?;
        let method = schema.endpoint().method;
        let payload = Value::Object(body);
        let request_body = match method {
            Method::Get => None,
            Method::Post => Some(serde_json::to_vec(&payload)?),
        };

        debug!(
            operation = %schema.operation(),
            modifiers = %schema.modifiers(),
            url = %url,
            mapped = self.field_mapper.has_custom_mappings(),
            "Built operation"
        );

        let request = OperationRequest::new(
            method,
            url,
            request_body,
            self.timeout,
            schema.operation(),
        );
        Ok(Operation::new(
            schema.operation(),
            schema.modifiers(),
            values.clone(),
            payload,
            request,
        ))
    }

    fn endpoint_url(&self, schema: &ConfigurationSchema, path_values: &[(&str, String)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                GatewayError::Config(format!("base_url cannot carry a path: {}", self.base_url))
            })?;
            segments.pop_if_empty();
            for segment in self.api_prefix.split('/').filter(|s| !s.is_empty()) {
                segments.push(segment);
            }
            for segment in schema.endpoint().path.split('/').filter(|s| !s.is_empty()) {
                let placeholder = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}'));
                match placeholder {
                    Some(key) => {
                        let value = path_values
                            .iter()
                            .find(|(path, _)| *path == key)
                            .map(|(_, value)| value.as_str())
                            .ok_or_else(|| GatewayError::MissingConfiguration {
                                operation: schema.operation().to_string(),
                                missing: vec![key.to_owned()],
                            })?;
                        segments.push(value);
                    }
                    None => {
                        segments.push(segment);
                    }
                }
            }
        }
        Ok(url)
    }
}

/// Inserts `value` at the dot-delimited `payload_path`, creating intermediate objects.
fn insert_path(
    root: &mut Map<String, Value>,
    payload_path: &str,
    value: Value,
    config_key: &str,
) -> Result<()> {
    let conflict = || GatewayError::ConfigurationValidation {
        key: config_key.to_owned(),
        expected: format!("a payload path that does not overlap another key (at '{payload_path}')"),
    };

    let mut segments = payload_path.split('.').peekable();
    let mut current = root;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            if current.contains_key(segment) {
                return Err(conflict());
            }
            current.insert(segment.to_owned(), value);
            return Ok(());
        }
        let entry =
            current.entry(segment.to_owned()).or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(next) = entry else {
            return Err(conflict());
        };
        current = next;
    }
    Ok(())
}

/// Renders a path-parameter value as a single URL segment.
///
/// `.` and `..` are rejected because URL serialization would collapse them
/// into the surrounding path instead of encoding them.
fn path_segment(key: &str, value: &Value) -> Result<String> {
    let segment = match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    if matches!(segment.trim(), "" | "." | "..") {
        return Err(GatewayError::ConfigurationValidation {
            key: key.to_owned(),
            expected: "a path segment other than '.' or '..'".to_owned(),
        });
    }
    Ok(segment)
}

fn constant_json(value: &ConfigValue) -> Value {
    match value {
        ConfigValue::Boolean(flag) => Value::Bool(*flag),
        ConfigValue::Integer(integer) => Value::from(*integer),
        ConfigValue::Decimal(decimal) => Value::String(decimal.to_string()),
        ConfigValue::Text(text) => Value::String(text.clone()),
    }
}

/// Checks `value` against the declared format and returns its payload form.
///
/// # Errors
///
/// Returns [`GatewayError::ConfigurationValidation`] naming `spec.path`.
pub fn validate_value(spec: &KeySpec, value: &ConfigValue) -> Result<Value> {
    let invalid = || GatewayError::ConfigurationValidation {
        key: spec.path.clone(),
        expected: spec.format.expected(),
    };

    let json = match (&spec.format, value) {
        (KeyFormat::Text, ConfigValue::Text(text)) => Value::String(text.clone()),
        (KeyFormat::NonEmptyText, ConfigValue::Text(text)) if !text.trim().is_empty() => {
            Value::String(text.clone())
        }
        (KeyFormat::Integer, ConfigValue::Integer(integer)) => Value::from(*integer),
        (KeyFormat::PositiveInteger, ConfigValue::Integer(integer)) if *integer > 0 => {
            Value::from(*integer)
        }
        (KeyFormat::Amount, value) => Value::from(minor_units(value).ok_or_else(invalid)?),
        (KeyFormat::Boolean, ConfigValue::Boolean(flag)) => Value::Bool(*flag),
        (KeyFormat::CurrencyCode, ConfigValue::Text(text)) if is_upper_alpha(text, 3) => {
            Value::String(text.clone())
        }
        (KeyFormat::CountryCode, ConfigValue::Text(text)) if is_upper_alpha(text, 2) => {
            Value::String(text.clone())
        }
        (KeyFormat::LanguageCode, ConfigValue::Text(text))
            if text.len() == 2 && text.chars().all(|c| c.is_ascii_lowercase()) =>
        {
            Value::String(text.clone())
        }
        (KeyFormat::CardBrand, ConfigValue::Text(text)) if CARD_BRANDS.contains(&text.as_str()) => {
            Value::String(text.clone())
        }
        (KeyFormat::CardNumber, ConfigValue::Text(text)) => {
            Value::String(card_number(text).ok_or_else(invalid)?)
        }
        (KeyFormat::CardExpiry, ConfigValue::Text(text)) if is_card_expiry(text) => {
            Value::String(text.clone())
        }
        (KeyFormat::Cvv, ConfigValue::Text(text))
            if (3..=4).contains(&text.len()) && text.chars().all(|c| c.is_ascii_digit()) =>
        {
            Value::String(text.clone())
        }
        (KeyFormat::HttpsUrl, ConfigValue::Text(text)) if is_https_url(text) => {
            Value::String(text.clone())
        }
        (KeyFormat::Email, ConfigValue::Text(text)) if is_email(text) => {
            Value::String(text.clone())
        }
        (KeyFormat::Date, ConfigValue::Text(text))
            if NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok() =>
        {
            Value::String(text.clone())
        }
        (KeyFormat::OneOf(allowed), ConfigValue::Text(text)) if allowed.contains(&text.as_str()) => {
            Value::String(text.clone())
        }
        _ => return Err(invalid()),
    };
    Ok(json)
}

/// Converts a major-unit amount into minor units.
///
/// Accepts integers, decimals and numeric strings that are positive and carry
/// at most two decimal places.
fn minor_units(value: &ConfigValue) -> Option<i64> {
    let amount = match value {
        ConfigValue::Integer(integer) => Decimal::from(*integer),
        ConfigValue::Decimal(decimal) => *decimal,
        ConfigValue::Text(text) => Decimal::from_str(text.trim()).ok()?,
        ConfigValue::Boolean(_) => return None,
    };
    if amount <= Decimal::ZERO || amount.normalize().scale() > 2 {
        return None;
    }
    amount.checked_mul(Decimal::ONE_HUNDRED)?.to_i64()
}

fn is_upper_alpha(text: &str, len: usize) -> bool {
    text.len() == len && text.chars().all(|c| c.is_ascii_uppercase())
}

/// Returns the card number without separators if it is 13-19 digits and
/// passes the Luhn check.
fn card_number(text: &str) -> Option<String> {
    let digits: String = text.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    if !(13..=19).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    luhn_valid(&digits).then_some(digits)
}

fn luhn_valid(digits: &str) -> bool {
    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(index, byte)| {
            let digit = u32::from(byte - b'0');
            if index % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                digit
            }
        })
        .sum();
    sum % 10 == 0
}

fn is_card_expiry(text: &str) -> bool {
    let Some((month, year)) = text.split_once('/') else {
        return false;
    };
    let month_ok = month.len() == 2
        && month.parse::<u8>().is_ok_and(|m| (1..=12).contains(&m));
    let year_ok = matches!(year.len(), 2 | 4) && year.chars().all(|c| c.is_ascii_digit());
    month_ok && year_ok && month.chars().all(|c| c.is_ascii_digit())
}

fn is_https_url(text: &str) -> bool {
    Url::parse(text).is_ok_and(|url| url.scheme() == "https" && url.host_str().is_some())
}

fn is_email(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !text.chars().any(char::is_whitespace)
}
