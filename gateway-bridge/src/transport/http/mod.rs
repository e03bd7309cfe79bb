//! HTTP transport implementation.
//!
//! This module provides HTTP/1.1 and HTTP/2 transport using reqwest.

use std::sync::LazyLock;

use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use super::config::{HttpConfig, HttpVersion};
use crate::{
    error::{GatewayError, Result},
    transport::{Method, Transport, TransportFailure, TransportRequest, TransportResponse},
};

/// Default HTTP client with connection pooling enabled.
///
/// Using a singleton avoids recreating the client per transport instance,
/// preserving connection pooling benefits across all default transports.
static DEFAULT_HTTP_CLIENT: LazyLock<std::result::Result<Client, String>> = LazyLock::new(|| {
    build_client(&HttpConfig::default()).map_err(|e| e.to_string())
});

fn build_client(config: &HttpConfig) -> std::result::Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .connect_timeout(config.connect_timeout())
        .user_agent(config.user_agent.clone());

    builder = match config.http_version {
        HttpVersion::Http1 => builder.http1_only(),
        HttpVersion::Http2 => builder.http2_prior_knowledge(),
        HttpVersion::Auto => builder,
    };

    builder.build()
}

/// Validates URL for security constraints.
///
/// Ensures the URL uses HTTPS and does not point to localhost.
fn validate_url(url: &Url) -> std::result::Result<(), TransportFailure> {
    if url.scheme() != "https" {
        return Err(TransportFailure::Rejected("only HTTPS URLs are allowed".to_owned()));
    }

    if let Some(host) = url.host_str()
        && (host == "localhost" || host == "127.0.0.1" || host == "::1" || host == "[::1]")
    {
        return Err(TransportFailure::Rejected("localhost URLs are not allowed".to_owned()));
    }

    Ok(())
}

/// Validates header name and value for CRLF injection prevention.
fn validate_header(name: &str, value: &str) -> std::result::Result<(), TransportFailure> {
    if name.contains(['\r', '\n', '\0']) {
        return Err(TransportFailure::Rejected(
            "invalid header name: control characters not allowed".to_owned(),
        ));
    }
    if value.contains(['\r', '\n', '\0']) {
        return Err(TransportFailure::Rejected(format!(
            "invalid value for header '{name}': control characters not allowed"
        )));
    }
    Ok(())
}

fn map_reqwest_error(error: &reqwest::Error) -> TransportFailure {
    if error.is_timeout() {
        TransportFailure::Timeout
    } else if error.is_connect() {
        TransportFailure::Connect(error.to_string())
    } else {
        TransportFailure::Other(error.to_string())
    }
}

/// HTTP/1.1 and HTTP/2 transport using reqwest.
///
/// Supports connection pooling, keep-alive, and HTTP/2 multiplexing. Only
/// `https` URLs to non-loopback hosts are sent.
///
/// # Examples
///
/// ```
/// use gateway_bridge::transport::{HttpConfig, HttpTransport, HttpVersion, Transport};
///
/// let config = HttpConfig { http_version: HttpVersion::Http1, ..HttpConfig::default() };
/// let transport = HttpTransport::with_config(&config).unwrap();
/// assert_eq!(transport.protocol_name(), "http/1.1");
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    http_version: HttpVersion,
}

impl HttpTransport {
    /// Creates a new HTTP transport with default settings.
    ///
    /// Uses a shared singleton client for connection pooling efficiency.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if the TLS backend could not be initialised.
    pub fn new() -> Result<Self> {
        let client = DEFAULT_HTTP_CLIENT.as_ref().map_err(|e| {
            GatewayError::Config(format!("cannot create default HTTP client: {e}"))
        })?;
        Ok(Self { client: client.clone(), http_version: HttpVersion::Auto })
    }

    /// Creates HTTP transport with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if the configuration is out of bounds or
    /// the HTTP client cannot be created.
    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(config)
            .map_err(|e| GatewayError::Config(format!("cannot create HTTP client: {e}")))?;
        Ok(Self { client, http_version: config.http_version })
    }
}

impl Transport for HttpTransport {
    #[instrument(
        skip(self, request),
        fields(method = %request.method, host = request.url.host_str().unwrap_or_default())
    )]
    async fn send<'a>(
        &'a self,
        request: &'a TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportFailure> {
        // Security: Validate URL scheme and host
        validate_url(&request.url)?;

        // Security: Validate headers for CRLF injection
        for (key, value) in &request.headers {
            validate_header(key, value)?;
        }

        let mut builder = match request.method {
            Method::Get => self.client.get(request.url.clone()),
            Method::Post => self.client.post(request.url.clone()),
        };
        builder = builder.timeout(request.timeout);

        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| map_reqwest_error(&e))?;
        let status = response.status().as_u16();

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_owned()))
            .collect();

        let body = response.bytes().await.map_err(|e| map_reqwest_error(&e))?.to_vec();
        debug!(status, body_len = body.len(), "Received gateway response");

        Ok(TransportResponse { status, body, headers })
    }

    fn protocol_name(&self) -> &'static str {
        match self.http_version {
            HttpVersion::Http1 => "http/1.1",
            HttpVersion::Http2 => "http/2",
            HttpVersion::Auto => "http",
        }
    }
}
