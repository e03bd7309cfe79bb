//! Schema registry.
//!
//! Maps every supported operation type and modifier combination to the set of
//! configuration keys it requires, the optional keys with their defaults, and
//! the gateway endpoint it targets. The registry is built once and is
//! read-only afterwards, so a single instance can be shared freely across
//! threads.
//!
//! # Examples
//!
//! ```
//! use gateway_bridge::schema::{Modifiers, OperationType, PaymentRenderingMode, SchemaRegistry};
//!
//! let registry = SchemaRegistry::standard();
//! let schema = registry
//!     .schema_for(OperationType::DirectPayment, Modifiers::rendering(PaymentRenderingMode::Direct))
//!     .unwrap();
//!
//! assert!(schema.required_keys().any(|key| key == "payment.card.card.brand"));
//! ```

mod catalog;

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    configuration::ConfigValue,
    error::{GatewayError, Result},
    transport::Method,
};

/// Gateway operation type. Determines which schema applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    /// Payment with card data or a hosted payment page.
    DirectPayment,
    /// Payment with a previously saved card.
    OneClickPayment,
    /// Charge on an existing subscription.
    RecurringPaymentSubscription,
    /// Capture of an authorized payment.
    Capture,
    /// Refund of a captured payment.
    Refund,
    /// Cancellation of an authorized payment.
    Cancel,
    /// Retrieval of a payment.
    PaymentDetails,
}

impl OperationType {
    /// Every operation type, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::DirectPayment,
        Self::OneClickPayment,
        Self::RecurringPaymentSubscription,
        Self::Capture,
        Self::Refund,
        Self::Cancel,
        Self::PaymentDetails,
    ];

    /// Wire name of the operation type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DirectPayment => "DIRECT_PAYMENT",
            Self::OneClickPayment => "ONE_CLICK_PAYMENT",
            Self::RecurringPaymentSubscription => "RECURRING_PAYMENT_SUBSCRIPTION",
            Self::Capture => "CAPTURE",
            Self::Refund => "REFUND",
            Self::Cancel => "CANCEL",
            Self::PaymentDetails => "PAYMENT_DETAILS",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s).ok_or_else(|| {
            GatewayError::UnknownOperation { operation: s.to_owned(), modifiers: "none".to_owned() }
        })
    }
}

/// How the payment flow is presented to the payer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentRenderingMode {
    /// Payer is redirected to the gateway's hosted page.
    Redirect,
    /// The hosted page is embedded in the merchant page.
    Iframe,
    /// Card data is collected by the merchant and sent server to server.
    Direct,
}

impl PaymentRenderingMode {
    /// Every rendering mode, in declaration order.
    pub const ALL: [Self; 3] = [Self::Redirect, Self::Iframe, Self::Direct];

    /// Wire name of the rendering mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Redirect => "REDIRECT",
            Self::Iframe => "IFRAME",
            Self::Direct => "DIRECT",
        }
    }
}

impl fmt::Display for PaymentRenderingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation variant selectors that co-constrain the required key set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    /// Rendering mode, for operations that present a payment flow.
    #[serde(default)]
    pub rendering_mode: Option<PaymentRenderingMode>,
    /// Store the card for later one-click payments.
    #[serde(default)]
    pub save_card: bool,
    /// Open a subscription with this payment.
    #[serde(default)]
    pub initialize_subscription: bool,
}

impl Modifiers {
    /// No modifiers.
    pub const NONE: Self =
        Self { rendering_mode: None, save_card: false, initialize_subscription: false };

    /// Modifiers selecting only a rendering mode.
    #[must_use]
    pub const fn rendering(mode: PaymentRenderingMode) -> Self {
        Self { rendering_mode: Some(mode), ..Self::NONE }
    }

    /// Sets the `save_card` flag.
    #[must_use]
    pub const fn with_save_card(mut self, save_card: bool) -> Self {
        self.save_card = save_card;
        self
    }

    /// Sets the `initialize_subscription` flag.
    #[must_use]
    pub const fn with_initialize_subscription(mut self, initialize: bool) -> Self {
        self.initialize_subscription = initialize;
        self
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(mode) = self.rendering_mode {
            parts.push(format!("rendering_mode={mode}"));
        }
        if self.save_card {
            parts.push("save_card".to_owned());
        }
        if self.initialize_subscription {
            parts.push("initialize_subscription".to_owned());
        }
        if parts.is_empty() { f.write_str("none") } else { write!(f, "{{{}}}", parts.join(", ")) }
    }
}

/// Accepted type and format of a configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFormat {
    /// Any string.
    Text,
    /// A string that is not blank.
    NonEmptyText,
    /// Any integer.
    Integer,
    /// An integer greater than zero.
    PositiveInteger,
    /// A positive amount in major units with at most two decimals.
    /// Sent to the gateway as an integer number of minor units.
    Amount,
    /// A boolean.
    Boolean,
    /// ISO 4217 alphabetic currency code, uppercase.
    CurrencyCode,
    /// ISO 3166-1 alpha-2 country code, uppercase.
    CountryCode,
    /// ISO 639-1 language code, lowercase.
    LanguageCode,
    /// Card brand accepted by the gateway.
    CardBrand,
    /// Primary account number: 13 to 19 digits passing the Luhn check.
    CardNumber,
    /// Card expiry as `MM/YY` or `MM/YYYY`.
    CardExpiry,
    /// Card verification value: 3 or 4 digits.
    Cvv,
    /// Absolute `https` URL.
    HttpsUrl,
    /// E-mail address.
    Email,
    /// Calendar date as `YYYY-MM-DD`.
    Date,
    /// One of a fixed set of strings.
    OneOf(&'static [&'static str]),
}

/// Card brands accepted by [`KeyFormat::CardBrand`].
pub const CARD_BRANDS: &[&str] = &["VISA", "MASTERCARD", "AMEX", "CB", "MAESTRO", "DISCOVER"];

impl KeyFormat {
    /// Human-readable description of the accepted values, used in error reports.
    #[must_use]
    pub fn expected(&self) -> String {
        match self {
            Self::Text => "a string".to_owned(),
            Self::NonEmptyText => "a non-empty string".to_owned(),
            Self::Integer => "an integer".to_owned(),
            Self::PositiveInteger => "an integer greater than zero".to_owned(),
            Self::Amount => "a positive amount with at most 2 decimal places".to_owned(),
            Self::Boolean => "a boolean".to_owned(),
            Self::CurrencyCode => "an ISO 4217 currency code (e.g. EUR)".to_owned(),
            Self::CountryCode => "an ISO 3166-1 alpha-2 country code (e.g. FR)".to_owned(),
            Self::LanguageCode => "an ISO 639-1 language code (e.g. en)".to_owned(),
            Self::CardBrand => format!("one of {}", CARD_BRANDS.join(", ")),
            Self::CardNumber => "a card number of 13 to 19 digits passing the Luhn check".to_owned(),
            Self::CardExpiry => "a card expiry formatted as MM/YY or MM/YYYY".to_owned(),
            Self::Cvv => "a string of 3 or 4 digits".to_owned(),
            Self::HttpsUrl => "an absolute https URL".to_owned(),
            Self::Email => "an e-mail address".to_owned(),
            Self::Date => "a date formatted as YYYY-MM-DD".to_owned(),
            Self::OneOf(values) => format!("one of {}", values.join(", ")),
        }
    }
}

/// A single configuration key and its accepted format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    /// Dot-delimited configuration path, treated as an opaque string.
    pub path: String,
    /// Accepted format.
    pub format: KeyFormat,
}

impl KeySpec {
    /// Creates a key specification.
    #[must_use]
    pub fn new(path: impl Into<String>, format: KeyFormat) -> Self {
        Self { path: path.into(), format }
    }
}

/// An optional key with the value used when the caller omits it.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionalKey {
    /// Key specification.
    pub spec: KeySpec,
    /// Default value.
    pub default: ConfigValue,
}

/// Gateway endpoint targeted by an operation.
///
/// `{key}` placeholders in the path template are filled from the resolved
/// configuration; such keys are path parameters and are left out of the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// HTTP method.
    pub method: Method,
    /// Path template relative to the API prefix (e.g. `/payments/{payment.id}`).
    pub path: String,
}

impl Endpoint {
    /// Creates an endpoint.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into() }
    }

    /// Returns true if `key` is substituted into the path template.
    #[must_use]
    pub fn is_path_parameter(&self, key: &str) -> bool {
        self.path_parameters().any(|param| param == key)
    }

    /// Iterates the `{key}` placeholders of the path template.
    pub fn path_parameters(&self) -> impl Iterator<Item = &str> {
        self.path
            .split('/')
            .filter_map(|segment| segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
    }
}

/// Key sets and endpoint for one operation type and modifier combination.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationSchema {
    operation: OperationType,
    modifiers: Modifiers,
    endpoint: Endpoint,
    required: Vec<KeySpec>,
    optional: Vec<OptionalKey>,
    constants: Vec<(String, ConfigValue)>,
}

impl ConfigurationSchema {
    /// Starts an empty schema.
    #[must_use]
    pub fn new(operation: OperationType, modifiers: Modifiers, endpoint: Endpoint) -> Self {
        Self {
            operation,
            modifiers,
            endpoint,
            required: Vec::new(),
            optional: Vec::new(),
            constants: Vec::new(),
        }
    }

    /// Appends a required key. A path already declared is left in its first position.
    #[must_use]
    pub fn require(mut self, path: &str, format: KeyFormat) -> Self {
        if !self.contains(path) {
            self.required.push(KeySpec::new(path, format));
        }
        self
    }

    /// Appends an optional key with its default.
    #[must_use]
    pub fn optional(mut self, path: &str, format: KeyFormat, default: impl Into<ConfigValue>) -> Self {
        if !self.contains(path) {
            self.optional.push(OptionalKey { spec: KeySpec::new(path, format), default: default.into() });
        }
        self
    }

    /// Adds a value that is always sent in the payload and cannot be overridden.
    #[must_use]
    pub fn constant(mut self, path: &str, value: impl Into<ConfigValue>) -> Self {
        self.constants.push((path.to_owned(), value.into()));
        self
    }

    /// Operation type this schema applies to.
    #[must_use]
    pub const fn operation(&self) -> OperationType {
        self.operation
    }

    /// Modifier combination this schema applies to.
    #[must_use]
    pub const fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Targeted endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Required keys in declaration order.
    #[must_use]
    pub fn required(&self) -> &[KeySpec] {
        &self.required
    }

    /// Required key paths in declaration order.
    pub fn required_keys(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(|spec| spec.path.as_str())
    }

    /// Optional keys with defaults, in declaration order.
    #[must_use]
    pub fn optional_keys(&self) -> &[OptionalKey] {
        &self.optional
    }

    /// Fixed payload values contributed by the operation variant.
    #[must_use]
    pub fn constants(&self) -> &[(String, ConfigValue)] {
        &self.constants
    }

    /// Every declared key, required first, in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &KeySpec> {
        self.required.iter().chain(self.optional.iter().map(|optional| &optional.spec))
    }

    /// Looks up a declared key.
    #[must_use]
    pub fn spec_for(&self, path: &str) -> Option<&KeySpec> {
        self.keys().find(|spec| spec.path == path)
    }

    /// Returns true if `path` is a declared key.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.spec_for(path).is_some()
    }
}

/// Read-only table of configuration schemas.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<(OperationType, Modifiers), ConfigurationSchema>,
}

impl SchemaRegistry {
    /// Registry holding every operation variant the gateway supports.
    #[must_use]
    pub fn standard() -> Self {
        Self::from_schemas(catalog::standard_schemas())
    }

    /// Builds a registry from explicit schemas. Later duplicates replace earlier ones.
    #[must_use]
    pub fn from_schemas(schemas: impl IntoIterator<Item = ConfigurationSchema>) -> Self {
        let schemas = schemas
            .into_iter()
            .map(|schema| ((schema.operation, schema.modifiers), schema))
            .collect();
        Self { schemas }
    }

    /// Returns the schema for an operation type and modifiers.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownOperation`] if the combination is not registered.
    pub fn schema_for(
        &self,
        operation: OperationType,
        modifiers: Modifiers,
    ) -> Result<&ConfigurationSchema> {
        self.schemas.get(&(operation, modifiers)).ok_or_else(|| GatewayError::UnknownOperation {
            operation: operation.to_string(),
            modifiers: modifiers.to_string(),
        })
    }

    /// Iterates every registered schema in a deterministic order.
    pub fn registered(&self) -> impl Iterator<Item = &ConfigurationSchema> {
        let mut schemas: Vec<_> = self.schemas.values().collect();
        schemas.sort_by_key(|schema| {
            let m = schema.modifiers;
            (schema.operation, m.rendering_mode, m.save_card, m.initialize_subscription)
        });
        schemas.into_iter()
    }

    /// Number of registered schemas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_type_round_trips_wire_name() {
        for op in OperationType::ALL {
            assert_eq!(op.as_str().parse::<OperationType>().unwrap(), op);
        }
    }

    #[test]
    fn test_operation_type_unknown_name() {
        let err = "WIRE_TRANSFER".parse::<OperationType>().unwrap_err();
        assert!(matches!(err, GatewayError::UnknownOperation { operation, .. } if operation == "WIRE_TRANSFER"));
    }

    #[test]
    fn test_operation_type_serde_name() {
        let json = serde_json::to_string(&OperationType::RecurringPaymentSubscription).unwrap();
        assert_eq!(json, "\"RECURRING_PAYMENT_SUBSCRIPTION\"");
    }

    #[test]
    fn test_modifiers_display() {
        assert_eq!(Modifiers::NONE.to_string(), "none");
        let modifiers = Modifiers::rendering(PaymentRenderingMode::Iframe).with_save_card(true);
        assert_eq!(modifiers.to_string(), "{rendering_mode=IFRAME, save_card}");
    }

    #[test]
    fn test_endpoint_path_parameters() {
        let endpoint = Endpoint::new(Method::Post, "/payments/{payment.id}/refunds");
        assert_eq!(endpoint.path_parameters().collect::<Vec<_>>(), vec!["payment.id"]);
        assert!(endpoint.is_path_parameter("payment.id"));
        assert!(!endpoint.is_path_parameter("payment.amount"));
    }

    #[test]
    fn test_schema_require_keeps_first_declaration() {
        let schema = ConfigurationSchema::new(
            OperationType::Cancel,
            Modifiers::NONE,
            Endpoint::new(Method::Post, "/x"),
        )
        .require("a", KeyFormat::Text)
        .require("b", KeyFormat::Text)
        .require("a", KeyFormat::Integer);

        assert_eq!(schema.required_keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(schema.spec_for("a").unwrap().format, KeyFormat::Text);
    }

    #[test]
    fn test_unknown_combination_is_rejected() {
        let registry = SchemaRegistry::standard();
        let err = registry
            .schema_for(OperationType::Refund, Modifiers::NONE.with_save_card(true))
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnknownOperation { .. }));
        assert!(err.to_string().contains("REFUND"));
        assert!(err.to_string().contains("save_card"));
    }

    #[test]
    fn test_direct_payment_requires_rendering_mode() {
        let registry = SchemaRegistry::standard();
        assert!(registry.schema_for(OperationType::DirectPayment, Modifiers::NONE).is_err());
    }

    #[test]
    fn test_registered_is_deterministic() {
        let registry = SchemaRegistry::standard();
        let first: Vec<_> =
            registry.registered().map(|s| (s.operation(), s.modifiers())).collect();
        let second: Vec<_> =
            registry.registered().map(|s| (s.operation(), s.modifiers())).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), registry.len());
    }

    #[test]
    fn test_empty_registry() {
        let registry = SchemaRegistry::default();
        assert!(registry.is_empty());
        assert!(registry.schema_for(OperationType::Capture, Modifiers::NONE).is_err());
    }

    #[test]
    fn test_card_brand_expected_lists_brands() {
        assert!(KeyFormat::CardBrand.expected().contains("MASTERCARD"));
    }
}
