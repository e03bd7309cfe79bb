//! Gateway Bridge: configuration-driven payment gateway client
//!
//! A Rust library that turns flat, dot-path keyed configuration maps into
//! validated payment gateway operations, manages OAuth2 access tokens, sends
//! each operation through a caller-supplied transport, and decodes gateway
//! response codes into localized diagnostics.
//!
//! # Architecture
//!
//! ```text
//! ConfigurationMap ──diff/resolve──▶ ResolvedConfiguration ──build──▶ Operation
//!        ▲                 │                                               │
//!        │           SchemaRegistry                                  dispatch(token, transport)
//!   caller adds       (required / optional                                 │
//!   missing keys       keys per variant)                                   ▼
//!                                                        GatewayResponse │ ApiCall{kind}
//!                                                                          │
//!                                                        CodeMessageCatalog::decode(code)
//! ```
//!
//! - **Schema registry** ([`schema`]): required and optional keys, defaults
//!   and endpoint for every operation type and modifier combination
//! - **Resolver** ([`resolver`]): reports missing keys in declaration order,
//!   merges defaults, never mutates the caller's map
//! - **Builder** ([`builder`]): per-key format validation and JSON payload
//!   assembly; pure, no I/O
//! - **Token manager** ([`token`]): client credentials exchange; tokens are
//!   owned by the caller
//! - **Dispatcher** ([`dispatch`]): exactly one attempt, failures classified
//!   as [`ApiCallErrorKind`]
//! - **Code decoder** ([`codes`]): three-tier state/module/parameter lookup
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use gateway_bridge::{
//!     GatewayClient,
//!     config::{ClientConfig, MerchantCredentials},
//!     configuration::ConfigurationMap,
//!     schema::{Modifiers, OperationType},
//!     transport::HttpTransport,
//! };
//!
//! # async fn example() -> gateway_bridge::Result<()> {
//! let client = GatewayClient::new(ClientConfig::from_file("gateway.toml")?)?;
//! let transport = HttpTransport::with_config(&client.config().transport)?;
//! let credentials = MerchantCredentials::from_env("GATEWAY_MERCHANT_ID", "GATEWAY_API_KEY")?;
//! let token = client.get_access_token(&credentials, &transport).await?;
//!
//! let refund = ConfigurationMap::new()
//!     .with("payment.id", "pay_8f2c")
//!     .with("payment.amount", "15.00")
//!     .with("payment.currency", "EUR");
//! let operation = client.build_operation(&refund, OperationType::Refund, Modifiers::NONE)?;
//! let response = operation.dispatch(&token, &transport).await?;
//! println!("refund accepted: HTTP {}", response.status);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Every operation returns [`Result<T>`](error::Result). Gateway failures carry
//! an [`ApiCallErrorKind`] so callers can choose between retrying, fixing the
//! input and refreshing the token:
//!
//! ```rust
//! use gateway_bridge::{ApiCallErrorKind, GatewayError};
//!
//! fn next_step(error: &GatewayError) -> &'static str {
//!     match error.api_call_kind() {
//!         Some(ApiCallErrorKind::AuthFailure) => "refresh token",
//!         Some(kind) if kind.is_retryable() => "retry with backoff",
//!         Some(_) => "fix payload",
//!         None => match error {
//!             GatewayError::MissingConfiguration { .. } => "ask for missing keys",
//!             _ => "abort",
//!         },
//!     }
//! }
//!
//! let error = GatewayError::api_call(ApiCallErrorKind::GatewayError, "upstream busy");
//! assert_eq!(next_step(&error), "retry with backoff");
//! ```
//!
//! # Security Considerations
//!
//! - **HTTPS only**: base URLs and transports reject plain HTTP and loopback hosts
//! - **Secrets**: api keys and tokens are zeroized on drop and redacted from `Debug`
//! - **Card data**: card numbers and CVVs are redacted from configuration `Debug` output
//! - **Bounded calls**: every dispatch is limited by the configured timeout

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest"
)]

pub mod builder;
pub mod client;
pub mod codes;
pub mod config;
pub mod configuration;
pub mod dispatch;
pub mod error;
pub mod field_map;
pub mod operation;
pub mod reliability;
pub mod resolver;
pub mod schema;
pub mod token;
pub mod transport;

pub use client::GatewayClient;
pub use error::{ApiCallErrorKind, CodeMessageError, GatewayError, Result};
pub use operation::Operation;
