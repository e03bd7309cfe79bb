//! Transport abstraction.
//!
//! The bridge never opens sockets itself: every gateway call goes through a
//! [`Transport`] supplied by the caller at dispatch time. [`HttpTransport`] is
//! the reqwest-backed implementation; tests and embedders can provide their own.
//!
//! A transport sends one request and reports either the status and body it
//! received or a [`TransportFailure`]. Interpreting status codes is the
//! dispatcher's job, not the transport's.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use gateway_bridge::transport::{HttpTransport, Method, Transport, TransportRequest};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new()?;
//! let request = TransportRequest {
//!     method: Method::Get,
//!     url: Url::parse("https://sandbox.api.gateway.example/v1/payments/pay-1")?,
//!     headers: vec![("Accept".to_owned(), "application/json".to_owned())],
//!     body: None,
//!     timeout: Duration::from_secs(10),
//! };
//!
//! let response = transport.send(&request).await?;
//! println!("Status: {}", response.status);
//! # Ok(())
//! # }
//! ```

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;
use std::{fmt, time::Duration};

use thiserror::Error;
use url::Url;
use zeroize::Zeroize;

pub mod config;
pub mod http;

pub use config::{HttpConfig, HttpVersion};
pub use http::HttpTransport;

/// HTTP method of a gateway request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

impl Method {
    /// Method name as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully serialized request handed to a transport.
#[derive(Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute request URL.
    pub url: Url,
    /// Request headers, including `Authorization`.
    pub headers: Vec<(String, String)>,
    /// Request body, if any.
    pub body: Option<Vec<u8>>,
    /// Upper bound for the whole exchange.
    pub timeout: Duration,
}

impl TransportRequest {
    /// Returns the first header with this name, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Overwrites every `Authorization` header value with zeroes and empties it.
    pub fn wipe_credentials(&mut self) {
        for (key, value) in &mut self.headers {
            if key.eq_ignore_ascii_case("authorization") {
                value.zeroize();
            }
        }
    }
}

impl Drop for TransportRequest {
    fn drop(&mut self) {
        self.wipe_credentials();
    }
}

impl fmt::Debug for TransportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(key, value)| {
                if key.eq_ignore_ascii_case("authorization") {
                    (key.as_str(), "[REDACTED]")
                } else {
                    (key.as_str(), value.as_str())
                }
            })
            .collect();
        f.debug_struct("TransportRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &headers)
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Response received by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body bytes.
    pub body: Vec<u8>,
    /// Response headers.
    pub headers: Vec<(String, String)>,
}

/// Transport-level failure: no HTTP response was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFailure {
    /// The exchange did not complete within the timeout.
    #[error("request timed out")]
    Timeout,
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),
    /// The request was refused locally and nothing was sent.
    ///
    /// Sending the same request again fails the same way.
    #[error("request rejected before sending: {0}")]
    Rejected(String),
    /// The exchange failed while sending or receiving.
    #[error("transport failure: {0}")]
    Other(String),
}

/// Sends serialized requests to the gateway.
///
/// Implementations perform exactly one attempt per call and must honour
/// [`TransportRequest::timeout`].
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the received response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportFailure`] if no HTTP response was received.
    fn send<'a>(
        &'a self,
        request: &'a TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportFailure>> + Send + 'a;

    /// Returns the protocol name for logging.
    fn protocol_name(&self) -> &'static str;
}
