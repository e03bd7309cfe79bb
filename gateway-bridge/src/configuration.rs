//! Flat configuration maps.
//!
//! A [`ConfigurationMap`] associates dot-delimited paths such as
//! `payment.card.card.brand` with typed scalar [`ConfigValue`]s. Paths are
//! opaque strings: `a.b` and a nested `a` table holding `b` only collide once
//! the map is flattened, never inside the map itself.
//!
//! Maps can be assembled in code or loaded from TOML and JSON documents, where
//! nested tables are flattened into dot paths.
//!
//! ```
//! use gateway_bridge::configuration::{ConfigValue, ConfigurationMap};
//!
//! let config = ConfigurationMap::from_toml_str(
//!     r#"
//!     [payment]
//!     amount = 12.5
//!     currency = "EUR"
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.get("payment.currency"), Some(&ConfigValue::from("EUR")));
//! ```

use std::{collections::BTreeMap, fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{self, Visitor},
};

use crate::error::{GatewayError, Result};

/// Path suffixes whose values are never rendered by `Debug`.
const REDACTED_SUFFIXES: &[&str] = &[".number", ".cvv", "api_key", "password"];

/// A typed scalar configuration value.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Boolean flag.
    Boolean(bool),
    /// Whole number.
    Integer(i64),
    /// Decimal number, kept exact.
    Decimal(Decimal),
    /// String.
    Text(String),
}

impl ConfigValue {
    /// Returns the string, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Name of the value's type, for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "string",
        }
    }
}

impl fmt::Debug for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "Boolean({value})"),
            Self::Integer(value) => write!(f, "Integer({value})"),
            Self::Decimal(value) => write!(f, "Decimal({value})"),
            Self::Text(value) => write!(f, "Text({value:?})"),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Decimal(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for ConfigValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<Decimal> for ConfigValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

/// Parses a float through its shortest decimal rendering so `12.5` stays `12.5`.
fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string()).ok()
}

impl<'de> Deserialize<'de> for ConfigValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ConfigValueVisitor;

        impl Visitor<'_> for ConfigValueVisitor {
            type Value = ConfigValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string, integer, decimal or boolean")
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> std::result::Result<Self::Value, E> {
                Ok(ConfigValue::Boolean(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Self::Value, E> {
                Ok(ConfigValue::Integer(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Self::Value, E> {
                i64::try_from(value)
                    .map(ConfigValue::Integer)
                    .map_err(|_| E::custom(format!("integer {value} is out of range")))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<Self::Value, E> {
                decimal_from_f64(value)
                    .map(ConfigValue::Decimal)
                    .ok_or_else(|| E::custom(format!("number {value} is not representable")))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Self::Value, E> {
                Ok(ConfigValue::Text(value.to_owned()))
            }

            fn visit_string<E: de::Error>(
                self,
                value: String,
            ) -> std::result::Result<Self::Value, E> {
                Ok(ConfigValue::Text(value))
            }
        }

        deserializer.deserialize_any(ConfigValueVisitor)
    }
}

/// Mapping from dot-delimited path to scalar value.
///
/// Keys are unique and iteration is sorted by key. Inserting an existing key
/// replaces its value (last write wins).
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigurationMap {
    entries: BTreeMap<String, ConfigValue>,
}

impl ConfigurationMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the one it replaced.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ConfigValue>,
    ) -> Option<ConfigValue> {
        self.entries.insert(key.into(), value.into())
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        self.entries.remove(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Iterates keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Loads a map from a TOML document, flattening nested tables into dot paths.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidInput`] if the document does not parse or
    /// holds arrays.
    pub fn from_toml_str(document: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(document)
            .map_err(|e| GatewayError::InvalidInput(format!("invalid TOML configuration: {e}")))?;
        let mut map = Self::new();
        for (key, value) in table {
            flatten_toml(&mut map, key, value)?;
        }
        Ok(map)
    }

    /// Loads a map from a JSON document, flattening nested objects into dot paths.
    ///
    /// `null` values are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidInput`] if the document is not a JSON
    /// object or holds arrays.
    pub fn from_json_str(document: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(document)
            .map_err(|e| GatewayError::InvalidInput(format!("invalid JSON configuration: {e}")))?;
        Self::from_json_value(value)
    }

    /// Flattens an already-parsed JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidInput`] if `value` is not an object or holds arrays.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(object) = value else {
            return Err(GatewayError::InvalidInput(
                "JSON configuration must be an object".to_owned(),
            ));
        };
        let mut map = Self::new();
        for (key, value) in object {
            flatten_json(&mut map, key, value)?;
        }
        Ok(map)
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() { key.to_owned() } else { format!("{prefix}.{key}") }
}

/// Quoted dotted keys and nested tables can spell the same path.
fn insert_flattened(map: &mut ConfigurationMap, path: String, scalar: ConfigValue) -> Result<()> {
    if map.contains_key(&path) {
        return Err(GatewayError::InvalidInput(format!(
            "configuration key '{path}' is defined more than once"
        )));
    }
    map.insert(path, scalar);
    Ok(())
}

fn flatten_toml(map: &mut ConfigurationMap, path: String, value: toml::Value) -> Result<()> {
    let scalar = match value {
        toml::Value::Table(table) => {
            for (key, value) in table {
                flatten_toml(map, join_path(&path, &key), value)?;
            }
            return Ok(());
        }
        toml::Value::Array(_) => {
            return Err(GatewayError::InvalidInput(format!(
                "configuration key '{path}' holds an array; only scalars are supported"
            )));
        }
        toml::Value::String(text) => ConfigValue::Text(text),
        toml::Value::Integer(integer) => ConfigValue::Integer(integer),
        toml::Value::Boolean(flag) => ConfigValue::Boolean(flag),
        toml::Value::Datetime(datetime) => ConfigValue::Text(datetime.to_string()),
        toml::Value::Float(float) => decimal_from_f64(float).map(ConfigValue::Decimal).ok_or_else(
            || GatewayError::InvalidInput(format!("configuration key '{path}' is not a finite number")),
        )?,
    };
    insert_flattened(map, path, scalar)
}

fn flatten_json(map: &mut ConfigurationMap, path: String, value: serde_json::Value) -> Result<()> {
    let scalar = match value {
        serde_json::Value::Object(object) => {
            for (key, value) in object {
                flatten_json(map, join_path(&path, &key), value)?;
            }
            return Ok(());
        }
        serde_json::Value::Null => return Ok(()),
        serde_json::Value::Array(_) => {
            return Err(GatewayError::InvalidInput(format!(
                "configuration key '{path}' holds an array; only scalars are supported"
            )));
        }
        serde_json::Value::Bool(flag) => ConfigValue::Boolean(flag),
        serde_json::Value::String(text) => ConfigValue::Text(text),
        serde_json::Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                ConfigValue::Integer(integer)
            } else {
                Decimal::from_str(&number.to_string())
                    .or_else(|_| Decimal::from_scientific(&number.to_string()))
                    .map(ConfigValue::Decimal)
                    .map_err(|_| {
                        GatewayError::InvalidInput(format!(
                            "configuration key '{path}' holds an unsupported number {number}"
                        ))
                    })?
            }
        }
    };
    insert_flattened(map, path, scalar)
}

impl fmt::Debug for ConfigurationMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.entries {
            if REDACTED_SUFFIXES.iter().any(|suffix| key.ends_with(suffix)) {
                map.entry(key, &"[REDACTED]");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> FromIterator<(K, V)> for ConfigurationMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> Extend<(K, V)> for ConfigurationMap {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl IntoIterator for ConfigurationMap {
    type IntoIter = std::collections::btree_map::IntoIter<String, ConfigValue>;
    type Item = (String, ConfigValue);

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let map: ConfigurationMap =
            [("payment.currency", "EUR"), ("payment.currency", "USD")].into_iter().collect();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("payment.currency"), Some(&ConfigValue::from("USD")));
    }

    #[test]
    fn test_insert_returns_previous_value() {
        let mut map = ConfigurationMap::new();
        assert_eq!(map.insert("a", 1), None);
        assert_eq!(map.insert("a", 2), Some(ConfigValue::Integer(1)));
    }

    #[test]
    fn test_paths_are_opaque() {
        let map = ConfigurationMap::new().with("a.b", "x").with("a", "y");
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("a.b"));
        assert!(map.contains_key("a"));
        assert!(!map.contains_key("b"));
    }

    #[test]
    fn test_from_toml_flattens_tables() {
        let map = ConfigurationMap::from_toml_str(
            r#"
            order.reference = "ORD-1"

            [payment]
            amount = 12.5
            currency = "EUR"

            [payment.card.card]
            brand = "VISA"
            "#,
        )
        .unwrap();

        assert_eq!(map.get("order.reference"), Some(&ConfigValue::from("ORD-1")));
        assert_eq!(map.get("payment.amount"), Some(&ConfigValue::Decimal(Decimal::new(125, 1))));
        assert_eq!(map.get("payment.card.card.brand"), Some(&ConfigValue::from("VISA")));
    }

    #[test]
    fn test_from_toml_quoted_dotted_key_is_kept() {
        let map = ConfigurationMap::from_toml_str(r#""payment.currency" = "EUR""#).unwrap();
        assert_eq!(map.get("payment.currency"), Some(&ConfigValue::from("EUR")));
    }

    #[test]
    fn test_from_toml_rejects_quoted_and_nested_collision() {
        let err =
            ConfigurationMap::from_toml_str("\"payment.amount\" = 1\n\n[payment]\namount = 2\n")
                .unwrap_err();
        assert!(matches!(&err, GatewayError::InvalidInput(msg) if msg.contains("payment.amount")));
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_from_toml_rejects_arrays() {
        let err = ConfigurationMap::from_toml_str("payment.tags = [1, 2]").unwrap_err();
        assert!(err.to_string().contains("payment.tags"));
    }

    #[test]
    fn test_from_json_flattens_objects_and_skips_null() {
        let map = ConfigurationMap::from_json_str(
            r#"{"payment": {"amount": 10, "currency": "EUR", "note": null}, "customer.id": "c-1"}"#,
        )
        .unwrap();
        assert_eq!(map.get("payment.amount"), Some(&ConfigValue::Integer(10)));
        assert_eq!(map.get("customer.id"), Some(&ConfigValue::from("c-1")));
        assert!(!map.contains_key("payment.note"));
    }

    #[test]
    fn test_from_json_rejects_quoted_and_nested_collision() {
        let err =
            ConfigurationMap::from_json_str(r#"{"payment.amount": 1, "payment": {"amount": 2}}"#)
                .unwrap_err();
        assert!(matches!(&err, GatewayError::InvalidInput(msg) if msg.contains("payment.amount")));

        let map =
            ConfigurationMap::from_json_str(r#"{"payment.amount": null, "payment": {"amount": 2}}"#)
                .unwrap();
        assert_eq!(map.get("payment.amount"), Some(&ConfigValue::Integer(2)));
    }

    #[test]
    fn test_from_json_decimal() {
        let map = ConfigurationMap::from_json_str(r#"{"payment": {"amount": 9.99}}"#).unwrap();
        assert_eq!(map.get("payment.amount"), Some(&ConfigValue::Decimal(Decimal::new(999, 2))));
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(ConfigurationMap::from_json_str("[1]").is_err());
        assert!(ConfigurationMap::from_json_str(r#"{"a": [1]}"#).is_err());
    }

    #[test]
    fn test_numeric_strings_stay_text() {
        let map: ConfigurationMap =
            serde_json::from_str(r#"{"payment.card.card.number": "4111111111111111"}"#).unwrap();
        assert_eq!(
            map.get("payment.card.card.number"),
            Some(&ConfigValue::from("4111111111111111"))
        );
    }

    #[test]
    fn test_debug_redacts_card_data() {
        let map = ConfigurationMap::new()
            .with("payment.card.card.number", "4111111111111111")
            .with("payment.card.card.cvv", "123")
            .with("payment.currency", "EUR");
        let debug = format!("{map:?}");
        assert!(!debug.contains("4111111111111111"));
        assert!(!debug.contains("\"123\""));
        assert!(debug.contains("EUR"));
    }

    #[test]
    fn test_display_values() {
        assert_eq!(ConfigValue::from(true).to_string(), "true");
        assert_eq!(ConfigValue::from(42).to_string(), "42");
        assert_eq!(ConfigValue::Decimal(Decimal::new(1050, 2)).to_string(), "10.50");
        assert_eq!(ConfigValue::from("abc").to_string(), "abc");
    }
}
