//! Field mapping implementations.
//!
//! A [`FieldMapper`] translates configuration paths into the payload paths the
//! gateway expects, so one configuration vocabulary can target gateway
//! contracts that nest or name fields differently.

use std::{borrow::Cow, collections::HashMap, fmt};

use crate::config::FieldMappingConfig;

/// Maps configuration paths to payload paths.
pub trait FieldMapper: Send + Sync + fmt::Debug {
    /// Returns the payload path for a configuration path, or the path itself
    /// if no mapping exists.
    fn payload_field<'a>(&self, config_path: &'a str) -> Cow<'a, str>;

    /// Returns true if this mapper has any custom mappings.
    fn has_custom_mappings(&self) -> bool;
}

/// Identity field mapper (no transformation).
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFieldMapper;

impl IdentityFieldMapper {
    /// Creates a new identity field mapper.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl FieldMapper for IdentityFieldMapper {
    fn payload_field<'a>(&self, config_path: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(config_path)
    }

    fn has_custom_mappings(&self) -> bool {
        false
    }
}

/// Field mapper driven by the `[field_mappings]` configuration table.
#[derive(Debug, Clone, Default)]
pub struct ConfigurableFieldMapper {
    payload_mappings: HashMap<String, String>,
}

impl ConfigurableFieldMapper {
    /// Creates a mapper from configuration.
    #[must_use]
    pub fn new(config: &FieldMappingConfig) -> Self {
        Self { payload_mappings: config.payload.clone() }
    }
}

impl FieldMapper for ConfigurableFieldMapper {
    fn payload_field<'a>(&self, config_path: &'a str) -> Cow<'a, str> {
        self.payload_mappings
            .get(config_path)
            .map_or_else(|| Cow::Borrowed(config_path), |s| Cow::Owned(s.clone()))
    }

    fn has_custom_mappings(&self) -> bool {
        !self.payload_mappings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(pairs: &[(&str, &str)]) -> ConfigurableFieldMapper {
        let payload =
            pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        ConfigurableFieldMapper::new(&FieldMappingConfig { payload })
    }

    #[test]
    fn test_identity_field_mapper() {
        let mapper = IdentityFieldMapper::new();
        assert_eq!(mapper.payload_field("payment.card.card.brand"), "payment.card.card.brand");
        assert!(!mapper.has_custom_mappings());
    }

    #[test]
    fn test_identity_mapper_cow_borrowed() {
        let mapper = IdentityFieldMapper::new();
        assert!(matches!(mapper.payload_field("order.reference"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_configurable_field_mapper_empty() {
        let mapper = ConfigurableFieldMapper::default();
        assert_eq!(mapper.payload_field("payment.amount"), "payment.amount");
        assert!(!mapper.has_custom_mappings());
    }

    #[test]
    fn test_configurable_field_mapper_renames() {
        let mapper = mapper(&[("order.reference", "merchant.order_id")]);
        assert_eq!(mapper.payload_field("order.reference"), "merchant.order_id");
        assert_eq!(mapper.payload_field("payment.amount"), "payment.amount");
        assert!(mapper.has_custom_mappings());
    }

    #[test]
    fn test_configurable_mapper_cow_owned_when_mapped() {
        let mapper = mapper(&[("a", "b")]);
        assert!(matches!(mapper.payload_field("a"), Cow::Owned(_)));
        assert!(matches!(mapper.payload_field("c"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_configurable_mapper_case_sensitivity() {
        let mapper = mapper(&[("customer.id", "buyer.id")]);
        assert_eq!(mapper.payload_field("Customer.ID"), "Customer.ID");
    }
}
