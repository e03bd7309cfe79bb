//! Built operations and their request handles.
//!
//! An [`Operation`] is the immutable result of
//! [`OperationBuilder::build`](crate::builder::OperationBuilder::build). It
//! owns an [`OperationRequest`], the bound request handle: method, URL,
//! serialized body and timeout, but no credentials. The access token and the
//! transport are supplied on every dispatch, so a token refreshed after the
//! operation was built is used as-is.

use std::{fmt, time::Duration};

use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::{
    configuration::ConfigurationMap,
    dispatch::{Dispatcher, GatewayResponse},
    error::Result,
    schema::{Modifiers, OperationType},
    token::AccessToken,
    transport::{Method, Transport, TransportRequest},
};

/// Header carrying the per-dispatch correlation id.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// A request bound to an endpoint, waiting for a token and a transport.
#[derive(Clone, PartialEq, Eq)]
pub struct OperationRequest {
    method: Method,
    url: Url,
    body: Option<Vec<u8>>,
    timeout: Duration,
    operation_type: OperationType,
}

impl OperationRequest {
    pub(crate) const fn new(
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
        timeout: Duration,
        operation_type: OperationType,
    ) -> Self {
        Self { method, url, body, timeout, operation_type }
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Absolute request URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Serialized JSON body, absent for `GET`.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Upper bound for one dispatch.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Operation type the request belongs to.
    #[must_use]
    pub const fn operation_type(&self) -> OperationType {
        self.operation_type
    }

    /// Serializes the request for a transport, attaching `token`.
    #[must_use]
    pub fn to_transport_request(&self, token: &AccessToken, request_id: Uuid) -> TransportRequest {
        let mut headers = vec![
            ("Authorization".to_owned(), token.authorization_header()),
            ("Accept".to_owned(), "application/json".to_owned()),
            (REQUEST_ID_HEADER.to_owned(), request_id.to_string()),
        ];
        if self.body.is_some() {
            headers.push(("Content-Type".to_owned(), "application/json".to_owned()));
        }
        TransportRequest {
            method: self.method,
            url: self.url.clone(),
            headers,
            body: self.body.clone(),
            timeout: self.timeout,
        }
    }
}

impl fmt::Debug for OperationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .field("timeout", &self.timeout)
            .field("operation_type", &self.operation_type)
            .finish()
    }
}

/// An immutable, fully validated request ready for dispatch.
#[derive(Clone, PartialEq)]
pub struct Operation {
    operation_type: OperationType,
    modifiers: Modifiers,
    configuration: ConfigurationMap,
    payload: Value,
    request: OperationRequest,
}

impl Operation {
    pub(crate) const fn new(
        operation_type: OperationType,
        modifiers: Modifiers,
        configuration: ConfigurationMap,
        payload: Value,
        request: OperationRequest,
    ) -> Self {
        Self { operation_type, modifiers, configuration, payload, request }
    }

    /// Operation type.
    #[must_use]
    pub const fn operation_type(&self) -> OperationType {
        self.operation_type
    }

    /// Modifiers the operation was built for.
    #[must_use]
    pub const fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Resolved configuration the operation was built from.
    #[must_use]
    pub const fn configuration(&self) -> &ConfigurationMap {
        &self.configuration
    }

    /// Structured request payload.
    ///
    /// Path parameters such as `payment.id` are not part of it; they are
    /// carried by [`OperationRequest::url`].
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Bound request handle.
    #[must_use]
    pub const fn request(&self) -> &OperationRequest {
        &self.request
    }

    /// Sends the operation once with `token` through `transport`.
    ///
    /// Repeated calls send the request again; nothing is cached.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::call`].
    pub async fn dispatch<T: Transport>(
        &self,
        token: &AccessToken,
        transport: &T,
    ) -> Result<GatewayResponse> {
        Dispatcher::new().call(self, token, transport).await
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("operation_type", &self.operation_type)
            .field("modifiers", &self.modifiers)
            .field("configuration", &self.configuration)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, Utc};

    use super::*;

    fn request(method: Method, body: Option<Vec<u8>>) -> OperationRequest {
        OperationRequest::new(
            method,
            Url::parse("https://sandbox.api.gateway.example/v1/payments").unwrap(),
            body,
            Duration::from_secs(7),
            OperationType::DirectPayment,
        )
    }

    fn token() -> AccessToken {
        AccessToken::new("tok_abc", "bearer", Utc::now() + TimeDelta::minutes(5), None)
    }

    #[test]
    fn test_transport_request_headers() {
        let id = Uuid::new_v4();
        let transport_request =
            request(Method::Post, Some(b"{\"a\":1}".to_vec())).to_transport_request(&token(), id);

        assert_eq!(transport_request.header("authorization"), Some("Bearer tok_abc"));
        assert_eq!(transport_request.header("content-type"), Some("application/json"));
        assert_eq!(transport_request.header(REQUEST_ID_HEADER), Some(id.to_string().as_str()));
        assert_eq!(transport_request.timeout, Duration::from_secs(7));
        assert_eq!(transport_request.body.as_deref(), Some(b"{\"a\":1}".as_slice()));
    }

    #[test]
    fn test_get_request_has_no_content_type() {
        let transport_request =
            request(Method::Get, None).to_transport_request(&token(), Uuid::new_v4());
        assert_eq!(transport_request.header("content-type"), None);
        assert!(transport_request.body.is_none());
    }

    #[test]
    fn test_debug_omits_body_and_payload() {
        let operation = Operation::new(
            OperationType::DirectPayment,
            Modifiers::NONE,
            ConfigurationMap::new().with("payment.card.card.number", "4111111111111111"),
            serde_json::json!({"payment": {"card": {"card": {"number": "4111111111111111"}}}}),
            request(Method::Post, Some(b"{\"number\":\"4111111111111111\"}".to_vec())),
        );
        let debug = format!("{operation:?}");
        assert!(!debug.contains("4111111111111111"));
        assert!(debug.contains("body_len"));
    }
}
