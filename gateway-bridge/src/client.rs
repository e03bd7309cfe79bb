//! Gateway client facade.
//!
//! [`GatewayClient`] binds a [`ClientConfig`] to the schema registry, operation
//! builder, token manager and code catalog, and exposes the calls an embedding
//! application needs. It holds no mutable state and can be shared across
//! tasks behind an `Arc`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use gateway_bridge::{
//!     GatewayClient,
//!     config::{ClientConfig, MerchantCredentials},
//!     configuration::ConfigurationMap,
//!     schema::{Modifiers, OperationType, PaymentRenderingMode},
//!     transport::HttpTransport,
//! };
//!
//! # async fn example() -> gateway_bridge::error::Result<()> {
//! let client = GatewayClient::new(ClientConfig::default())?;
//! let transport = HttpTransport::new()?;
//! let credentials = MerchantCredentials::from_env("GATEWAY_MERCHANT_ID", "GATEWAY_API_KEY")?;
//!
//! let token = client.get_access_token(&credentials, &transport).await?;
//!
//! let modifiers = Modifiers::rendering(PaymentRenderingMode::Redirect);
//! let config = ConfigurationMap::new()
//!     .with("order.reference", "ORD-1001")
//!     .with("payment.amount", "49.90")
//!     .with("payment.currency", "EUR");
//!
//! let diff = client.get_required_configuration_keys(&config, OperationType::DirectPayment, modifiers)?;
//! println!("still missing: {:?}", diff.missing);
//!
//! let config = config
//!     .with("payment.urls.return", "https://shop.example/return")
//!     .with("payment.urls.cancel", "https://shop.example/cancel");
//! let operation = client.build_operation(&config, OperationType::DirectPayment, modifiers)?;
//! let response = operation.dispatch(&token, &transport).await?;
//!
//! if let Some(code) = &response.code {
//!     let message = client.get_code_message(code, None)?;
//!     println!("{}: {}", message.state.description, message.state.message);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::{
    builder::OperationBuilder,
    codes::{CodeMessage, CodeMessageCatalog, DEFAULT_LANGUAGE},
    config::{ClientConfig, MerchantCredentials},
    configuration::ConfigurationMap,
    dispatch::GatewayResponse,
    error::{GatewayError, Result},
    operation::Operation,
    resolver::{ConfigurationDiff, ConfigurationResolver},
    schema::{Modifiers, OperationType, SchemaRegistry},
    token::{AccessToken, TokenManager},
    transport::Transport,
};

/// Caller-facing entry point of the bridge.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    config: ClientConfig,
    registry: Arc<SchemaRegistry>,
    builder: OperationBuilder,
    token_manager: TokenManager,
    catalog: Arc<CodeMessageCatalog>,
}

impl GatewayClient {
    /// Creates a client with the standard schemas and the bundled code dataset.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if `config` is invalid, or
    /// [`GatewayError::CodeMessage`] if the bundled dataset cannot be loaded.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let builder = OperationBuilder::from_config(&config)?;
        let token_manager = TokenManager::from_config(&config)?;
        let catalog = CodeMessageCatalog::bundled()?;
        debug!(
            environment = ?config.environment,
            base_url = %builder.base_url(),
            "Created gateway client"
        );
        Ok(Self {
            config,
            registry: Arc::new(SchemaRegistry::standard()),
            builder,
            token_manager,
            catalog,
        })
    }

    /// Replaces the schema registry.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<SchemaRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the code message catalog.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<CodeMessageCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Schema registry in use.
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Code message catalog in use.
    #[must_use]
    pub fn catalog(&self) -> &CodeMessageCatalog {
        &self.catalog
    }

    /// Exchanges `credentials` for an access token.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ApiCall`] if the exchange fails.
    pub async fn get_access_token<T: Transport>(
        &self,
        credentials: &MerchantCredentials,
        transport: &T,
    ) -> Result<AccessToken> {
        self.token_manager.get_access_token(credentials, transport).await
    }

    /// Reports which required keys `partial` still lacks.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownOperation`] for unregistered combinations.
    pub fn get_required_configuration_keys(
        &self,
        partial: &ConfigurationMap,
        operation: OperationType,
        modifiers: Modifiers,
    ) -> Result<ConfigurationDiff> {
        ConfigurationResolver::new(&self.registry).diff(partial, operation, modifiers)
    }

    /// Resolves `config` and builds the operation.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::UnknownOperation`] for unregistered combinations
    /// - [`GatewayError::MissingConfiguration`] naming the unmet keys
    /// - [`GatewayError::ConfigurationValidation`] naming the offending key
    pub fn build_operation(
        &self,
        config: &ConfigurationMap,
        operation: OperationType,
        modifiers: Modifiers,
    ) -> Result<Operation> {
        let resolved = ConfigurationResolver::new(&self.registry).resolve(config, operation, modifiers)?;
        self.builder.build(&self.registry, &resolved)
    }

    /// Retrieves a payment.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConfigurationValidation`] for an empty id, or
    /// any dispatch error.
    pub async fn get_payment_details<T: Transport>(
        &self,
        token: &AccessToken,
        payment_id: &str,
        transport: &T,
    ) -> Result<GatewayResponse> {
        let config = ConfigurationMap::new().with("payment.id", payment_id);
        let operation = self.build_operation(&config, OperationType::PaymentDetails, Modifiers::NONE)?;
        operation.dispatch(token, transport).await
    }

    /// Decodes a gateway code, in [`DEFAULT_LANGUAGE`] unless `language` is given.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::CodeMessage`] if the code is malformed or unknown,
    /// or the language is unsupported.
    pub fn get_code_message(&self, code: &str, language: Option<&str>) -> Result<CodeMessage> {
        self.catalog
            .decode(code, language.unwrap_or(DEFAULT_LANGUAGE))
            .map_err(GatewayError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::CodeMessageError,
        schema::{ConfigurationSchema, Endpoint, KeyFormat},
        transport::Method,
    };

    fn client() -> GatewayClient {
        GatewayClient::new(ClientConfig::default()).unwrap()
    }

    #[test]
    fn test_client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GatewayClient>();
        assert_send_sync::<Operation>();
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ClientConfig { dispatch_timeout_secs: 0, ..ClientConfig::default() };
        assert!(matches!(GatewayClient::new(config), Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_required_keys_for_empty_config() {
        let diff = client()
            .get_required_configuration_keys(
                &ConfigurationMap::new(),
                OperationType::Cancel,
                Modifiers::NONE,
            )
            .unwrap();
        assert_eq!(diff.missing, vec!["payment.id"]);
        assert!(diff.prefilled.contains_key("cancel.reason"));
    }

    #[test]
    fn test_build_operation_reports_missing_key() {
        let config = ConfigurationMap::new().with("payment.amount", 10);
        let err = client()
            .build_operation(&config, OperationType::Capture, Modifiers::NONE)
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::MissingConfiguration { ref missing, .. } if missing == &["payment.id"]
        ));
    }

    #[test]
    fn test_custom_registry() {
        let registry = SchemaRegistry::from_schemas([ConfigurationSchema::new(
            OperationType::Cancel,
            Modifiers::NONE,
            Endpoint::new(Method::Post, "/orders/{order.id}/void"),
        )
        .require("order.id", KeyFormat::NonEmptyText)]);
        let client = client().with_registry(Arc::new(registry));

        let operation = client
            .build_operation(
                &ConfigurationMap::new().with("order.id", "o-1"),
                OperationType::Cancel,
                Modifiers::NONE,
            )
            .unwrap();
        assert_eq!(
            operation.request().url().as_str(),
            "https://sandbox.api.gateway.example/v1/orders/o-1/void"
        );
        assert!(client.registry().schema_for(OperationType::Refund, Modifiers::NONE).is_err());
    }

    #[test]
    fn test_get_code_message_default_language() {
        let message = client().get_code_message("00000000", None).unwrap();
        assert_eq!(message.language, "en");
        let message = client().get_code_message("00000000", Some("fr")).unwrap();
        assert_eq!(message.language, "fr");
    }

    #[test]
    fn test_get_code_message_errors_convert() {
        let err = client().get_code_message("123", None).unwrap_err();
        assert!(matches!(err, GatewayError::CodeMessage(CodeMessageError::InvalidFormat { .. })));
        let err = client().get_code_message("00000000", Some("xx")).unwrap_err();
        assert!(matches!(
            err,
            GatewayError::CodeMessage(CodeMessageError::UnsupportedLanguage { .. })
        ));
    }
}
