//! Builds a hosted-page payment and, when credentials are present, sends it to
//! the sandbox.
//!
//! ```text
//! cargo run --example direct_payment
//! GATEWAY_MERCHANT_ID=... GATEWAY_API_KEY=... LOG_FORMAT=json cargo run --example direct_payment
//! ```

#![allow(missing_docs, reason = "demo binary")]

use std::io;

use gateway_bridge::{
    GatewayClient,
    config::{ClientConfig, MerchantCredentials},
    configuration::ConfigurationMap,
    schema::{Modifiers, OperationType, PaymentRenderingMode},
    transport::HttpTransport,
};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter);

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));
    if json {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_writer(io::stderr),
            )
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_span_events(FmtSpan::CLOSE).with_writer(io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let client = GatewayClient::new(ClientConfig::default())?;
    let modifiers = Modifiers::rendering(PaymentRenderingMode::Redirect);

    let partial = ConfigurationMap::new()
        .with("order.reference", "ORD-1001")
        .with("payment.amount", "49.90")
        .with("payment.currency", "EUR");
    let diff =
        client.get_required_configuration_keys(&partial, OperationType::DirectPayment, modifiers)?;
    info!(missing = ?diff.missing, "Checked configuration");

    let config = partial
        .with("payment.urls.return", "https://shop.example/return")
        .with("payment.urls.cancel", "https://shop.example/cancel");
    let operation = client.build_operation(&config, OperationType::DirectPayment, modifiers)?;
    println!("{}", serde_json::to_string_pretty(operation.payload())?);

    let Ok(credentials) = MerchantCredentials::from_env("GATEWAY_MERCHANT_ID", "GATEWAY_API_KEY")
    else {
        warn!("GATEWAY_MERCHANT_ID / GATEWAY_API_KEY not set, skipping dispatch");
        return Ok(());
    };

    let transport = HttpTransport::with_config(&client.config().transport)?;
    let token = client.get_access_token(&credentials, &transport).await?;

    match operation.dispatch(&token, &transport).await {
        Ok(response) => {
            info!(status = response.status, code = ?response.code, "Payment created");
        }
        Err(error) => {
            let decoded = error_code(&error).and_then(|code| client.get_code_message(code, None).ok());
            match decoded {
                Some(message) => warn!(
                    state = %message.state.description,
                    module = %message.module.description,
                    parameter = %message.parameter.description,
                    "Gateway refused the payment"
                ),
                None => warn!(error = %error, "Payment failed"),
            }
        }
    }
    Ok(())
}

fn error_code(error: &gateway_bridge::GatewayError) -> Option<&str> {
    match error {
        gateway_bridge::GatewayError::ApiCall { code, .. } => code.as_deref(),
        _ => None,
    }
}
