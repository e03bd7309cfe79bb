//! Operation schemas supported by the gateway.

use super::{
    ConfigurationSchema, Endpoint, KeyFormat, Modifiers, OperationType, PaymentRenderingMode,
};
use crate::transport::Method;

const CAPTURE_MODES: &[&str] = &["AUTOMATIC", "MANUAL"];
const HOSTED_TEMPLATES: &[&str] = &["DEFAULT", "COMPACT"];
const FREQUENCIES: &[&str] = &["DAILY", "WEEKLY", "MONTHLY", "YEARLY"];
const REFUND_REASONS: &[&str] = &["REQUESTED_BY_CUSTOMER", "DUPLICATE", "FRAUDULENT"];

/// Builds every registered schema.
pub(super) fn standard_schemas() -> Vec<ConfigurationSchema> {
    let mut schemas = Vec::new();

    for mode in PaymentRenderingMode::ALL {
        for save_card in [false, true] {
            for initialize_subscription in [false, true] {
                let modifiers = Modifiers::rendering(mode)
                    .with_save_card(save_card)
                    .with_initialize_subscription(initialize_subscription);
                schemas.push(direct_payment(modifiers, mode));
            }
        }
    }

    for initialize_subscription in [false, true] {
        schemas.push(one_click_payment(
            Modifiers::NONE.with_initialize_subscription(initialize_subscription),
        ));
    }

    schemas.push(
        ConfigurationSchema::new(
            OperationType::RecurringPaymentSubscription,
            Modifiers::NONE,
            Endpoint::new(Method::Post, "/subscriptions/{subscription.id}/payments"),
        )
        .require("subscription.id", KeyFormat::NonEmptyText)
        .require("order.reference", KeyFormat::NonEmptyText)
        .require("payment.amount", KeyFormat::Amount)
        .require("payment.currency", KeyFormat::CurrencyCode)
        .optional("order.description", KeyFormat::Text, ""),
    );

    schemas.push(
        ConfigurationSchema::new(
            OperationType::Capture,
            Modifiers::NONE,
            Endpoint::new(Method::Post, "/payments/{payment.id}/captures"),
        )
        .require("payment.id", KeyFormat::NonEmptyText)
        .require("payment.amount", KeyFormat::Amount),
    );

    schemas.push(
        ConfigurationSchema::new(
            OperationType::Refund,
            Modifiers::NONE,
            Endpoint::new(Method::Post, "/payments/{payment.id}/refunds"),
        )
        .require("payment.id", KeyFormat::NonEmptyText)
        .require("payment.amount", KeyFormat::Amount)
        .require("payment.currency", KeyFormat::CurrencyCode)
        .optional("refund.reason", KeyFormat::OneOf(REFUND_REASONS), "REQUESTED_BY_CUSTOMER"),
    );

    schemas.push(
        ConfigurationSchema::new(
            OperationType::Cancel,
            Modifiers::NONE,
            Endpoint::new(Method::Post, "/payments/{payment.id}/cancel"),
        )
        .require("payment.id", KeyFormat::NonEmptyText)
        .optional("cancel.reason", KeyFormat::Text, "MERCHANT_REQUEST"),
    );

    schemas.push(
        ConfigurationSchema::new(
            OperationType::PaymentDetails,
            Modifiers::NONE,
            Endpoint::new(Method::Get, "/payments/{payment.id}"),
        )
        .require("payment.id", KeyFormat::NonEmptyText),
    );

    schemas
}

fn payment_base(schema: ConfigurationSchema) -> ConfigurationSchema {
    schema
        .require("order.reference", KeyFormat::NonEmptyText)
        .require("payment.amount", KeyFormat::Amount)
        .require("payment.currency", KeyFormat::CurrencyCode)
        .optional("payment.capture_mode", KeyFormat::OneOf(CAPTURE_MODES), "AUTOMATIC")
        .optional("customer.language", KeyFormat::LanguageCode, "en")
        .optional("order.description", KeyFormat::Text, "")
}

fn direct_payment(modifiers: Modifiers, mode: PaymentRenderingMode) -> ConfigurationSchema {
    let mut schema = payment_base(ConfigurationSchema::new(
        OperationType::DirectPayment,
        modifiers,
        Endpoint::new(Method::Post, "/payments"),
    ))
    .constant("payment.rendering_mode", mode.as_str());

    schema = match mode {
        PaymentRenderingMode::Direct => schema
            .require("payment.card.card.number", KeyFormat::CardNumber)
            .require("payment.card.card.expiry", KeyFormat::CardExpiry)
            .require("payment.card.card.cvv", KeyFormat::Cvv)
            .require("payment.card.card.brand", KeyFormat::CardBrand)
            .require("payment.card.card.holder", KeyFormat::NonEmptyText)
            .optional("payment.card.three_ds.enabled", KeyFormat::Boolean, true),
        PaymentRenderingMode::Redirect => schema
            .require("payment.urls.return", KeyFormat::HttpsUrl)
            .require("payment.urls.cancel", KeyFormat::HttpsUrl)
            .optional("payment.hosted.template", KeyFormat::OneOf(HOSTED_TEMPLATES), "DEFAULT"),
        PaymentRenderingMode::Iframe => schema
            .require("payment.urls.return", KeyFormat::HttpsUrl)
            .require("payment.urls.cancel", KeyFormat::HttpsUrl)
            .require("payment.hosted.origin", KeyFormat::HttpsUrl)
            .optional("payment.hosted.template", KeyFormat::OneOf(HOSTED_TEMPLATES), "COMPACT"),
    };

    if modifiers.save_card {
        schema = save_card(schema);
    }
    if modifiers.initialize_subscription {
        schema = initialize_subscription(schema);
    }
    schema
}

fn one_click_payment(modifiers: Modifiers) -> ConfigurationSchema {
    let mut schema = payment_base(ConfigurationSchema::new(
        OperationType::OneClickPayment,
        modifiers,
        Endpoint::new(Method::Post, "/payments"),
    ))
    .require("customer.id", KeyFormat::NonEmptyText)
    .require("payment.card.alias.id", KeyFormat::NonEmptyText)
    .constant("payment.rendering_mode", PaymentRenderingMode::Direct.as_str());

    if modifiers.initialize_subscription {
        schema = initialize_subscription(schema);
    }
    schema
}

fn save_card(schema: ConfigurationSchema) -> ConfigurationSchema {
    schema
        .require("customer.id", KeyFormat::NonEmptyText)
        .require("customer.email", KeyFormat::Email)
        .optional("payment.card.alias.label", KeyFormat::Text, "default")
        .constant("payment.card.save", true)
}

fn initialize_subscription(schema: ConfigurationSchema) -> ConfigurationSchema {
    schema
        .require("customer.id", KeyFormat::NonEmptyText)
        .require("subscription.frequency", KeyFormat::OneOf(FREQUENCIES))
        .require("subscription.start_date", KeyFormat::Date)
        .optional("subscription.occurrences", KeyFormat::Integer, 0)
        .constant("subscription.initialize", true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;

    #[test]
    fn test_standard_schema_count() {
        // 3 rendering modes x 4 flag combinations, 2 one-click variants, 5 plain operations
        assert_eq!(standard_schemas().len(), 12 + 2 + 5);
    }

    #[test]
    fn test_every_operation_type_is_registered() {
        let registry = SchemaRegistry::standard();
        for op in OperationType::ALL {
            assert!(registry.registered().any(|schema| schema.operation() == op), "{op}");
        }
    }

    #[test]
    fn test_direct_card_key_order() {
        let registry = SchemaRegistry::standard();
        let schema = registry
            .schema_for(OperationType::DirectPayment, Modifiers::rendering(PaymentRenderingMode::Direct))
            .unwrap();
        assert_eq!(
            schema.required_keys().collect::<Vec<_>>(),
            vec![
                "order.reference",
                "payment.amount",
                "payment.currency",
                "payment.card.card.number",
                "payment.card.card.expiry",
                "payment.card.card.cvv",
                "payment.card.card.brand",
                "payment.card.card.holder",
            ]
        );
    }

    #[test]
    fn test_redirect_does_not_require_card() {
        let registry = SchemaRegistry::standard();
        let schema = registry
            .schema_for(
                OperationType::DirectPayment,
                Modifiers::rendering(PaymentRenderingMode::Redirect),
            )
            .unwrap();
        assert!(!schema.contains("payment.card.card.number"));
        assert!(schema.contains("payment.urls.return"));
    }

    #[test]
    fn test_save_card_and_subscription_share_customer_id() {
        let registry = SchemaRegistry::standard();
        let modifiers = Modifiers::rendering(PaymentRenderingMode::Direct)
            .with_save_card(true)
            .with_initialize_subscription(true);
        let schema = registry.schema_for(OperationType::DirectPayment, modifiers).unwrap();
        let count = schema.required_keys().filter(|key| *key == "customer.id").count();
        assert_eq!(count, 1);
        assert!(schema.contains("subscription.start_date"));
        assert!(schema.contains("customer.email"));
    }

    #[test]
    fn test_one_click_rejects_rendering_mode() {
        let registry = SchemaRegistry::standard();
        let modifiers = Modifiers::rendering(PaymentRenderingMode::Direct);
        assert!(registry.schema_for(OperationType::OneClickPayment, modifiers).is_err());
        assert!(registry.schema_for(OperationType::OneClickPayment, Modifiers::NONE).is_ok());
    }

    #[test]
    fn test_path_parameters_are_declared_keys() {
        for schema in SchemaRegistry::standard().registered() {
            for param in schema.endpoint().path_parameters() {
                assert!(schema.required_keys().any(|key| key == param), "{param}");
            }
        }
    }
}
