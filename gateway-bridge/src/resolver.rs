//! Configuration resolution.
//!
//! The resolver compares a caller's partial [`ConfigurationMap`] with the
//! schema of the targeted operation. [`ConfigurationResolver::diff`] reports
//! which required keys are still missing so callers can collect them
//! incrementally; [`ConfigurationResolver::resolve`] only succeeds once none
//! are, and yields a [`ResolvedConfiguration`], the only input the operation
//! builder accepts.
//!
//! The caller's map is never modified: both operations return new maps.

use tracing::debug;

use crate::{
    configuration::ConfigurationMap,
    error::{GatewayError, Result},
    schema::{ConfigurationSchema, Modifiers, OperationType, SchemaRegistry},
};

/// Outcome of comparing a partial configuration with a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationDiff {
    /// Schema keys taken from the partial configuration, plus defaults for
    /// absent optional keys. Keys unknown to the schema are dropped.
    pub prefilled: ConfigurationMap,
    /// Required keys absent from the partial configuration, in schema declaration order.
    pub missing: Vec<String>,
}

impl ConfigurationDiff {
    /// Returns true if no required key is missing.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// A configuration that satisfies every required key of its schema.
///
/// Only obtainable through [`ConfigurationResolver::resolve`], so holding one
/// proves the completeness check has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfiguration {
    operation: OperationType,
    modifiers: Modifiers,
    values: ConfigurationMap,
}

impl ResolvedConfiguration {
    /// Operation type the configuration was resolved for.
    #[must_use]
    pub const fn operation(&self) -> OperationType {
        self.operation
    }

    /// Modifiers the configuration was resolved for.
    #[must_use]
    pub const fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// The fully resolved map.
    #[must_use]
    pub const fn values(&self) -> &ConfigurationMap {
        &self.values
    }

    /// Consumes the resolution, returning the map.
    #[must_use]
    pub fn into_values(self) -> ConfigurationMap {
        self.values
    }
}

/// Computes missing keys and resolved maps against a [`SchemaRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct ConfigurationResolver<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> ConfigurationResolver<'r> {
    /// Creates a resolver over `registry`.
    #[must_use]
    pub const fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Compares `partial` with the schema for `operation` and `modifiers`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownOperation`] if no schema is registered
    /// for the combination.
    pub fn diff(
        &self,
        partial: &ConfigurationMap,
        operation: OperationType,
        modifiers: Modifiers,
    ) -> Result<ConfigurationDiff> {
        let schema = self.registry.schema_for(operation, modifiers)?;
        Ok(diff_against(schema, partial))
    }

    /// Resolves `config` into a complete configuration.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::UnknownOperation`] if no schema is registered
    /// - [`GatewayError::MissingConfiguration`] naming exactly the unmet keys
    pub fn resolve(
        &self,
        config: &ConfigurationMap,
        operation: OperationType,
        modifiers: Modifiers,
    ) -> Result<ResolvedConfiguration> {
        let ConfigurationDiff { prefilled, missing } = self.diff(config, operation, modifiers)?;
        if !missing.is_empty() {
            return Err(GatewayError::MissingConfiguration {
                operation: operation.to_string(),
                missing,
            });
        }
        Ok(ResolvedConfiguration { operation, modifiers, values: prefilled })
    }
}

fn diff_against(schema: &ConfigurationSchema, partial: &ConfigurationMap) -> ConfigurationDiff {
    let mut prefilled = ConfigurationMap::new();
    let mut missing = Vec::new();

    for spec in schema.required() {
        match partial.get(&spec.path) {
            Some(value) => {
                prefilled.insert(spec.path.clone(), value.clone());
            }
            None => missing.push(spec.path.clone()),
        }
    }

    for optional in schema.optional_keys() {
        let value = partial.get(&optional.spec.path).unwrap_or(&optional.default);
        prefilled.insert(optional.spec.path.clone(), value.clone());
    }

    let dropped = partial.keys().filter(|key| !schema.contains(key)).count();
    debug!(
        operation = %schema.operation(),
        modifiers = %schema.modifiers(),
        supplied = partial.len(),
        dropped,
        missing = missing.len(),
        "Compared configuration with schema"
    );

    ConfigurationDiff { prefilled, missing }
}
