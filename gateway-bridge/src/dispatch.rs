//! Single-attempt dispatch and failure classification.
//!
//! The [`Dispatcher`] sends a built [`Operation`] exactly once and turns the
//! outcome into either a [`GatewayResponse`] or a classified
//! [`GatewayError::ApiCall`]. It never retries; callers that want retries wrap
//! the call with [`retry_with_backoff`](crate::reliability::retry_with_backoff).
//!
//! # Classification
//!
//! | Outcome                                  | Kind                |
//! |------------------------------------------|---------------------|
//! | transport timeout or connection failure  | `NetworkFailure`    |
//! | request rejected by the transport unsent | `ValidationFailure` |
//! | no response within the request timeout   | `NetworkFailure`    |
//! | HTTP 401, 403                            | `AuthFailure`       |
//! | HTTP 408                                 | `NetworkFailure`    |
//! | HTTP 429, 5xx                            | `GatewayError`      |
//! | other HTTP 4xx                           | `ValidationFailure` |
//! | 2xx whose state code is not `00` or `01`  | `ValidationFailure` |
//! | 2xx with a body that is not JSON         | `GatewayError`      |

use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::{ApiCallErrorKind, GatewayError, Result},
    operation::Operation,
    token::AccessToken,
    transport::{Transport, TransportFailure, TransportRequest, TransportResponse},
};

/// State tiers that do not signal a refusal: success and pending.
const ACCEPTED_STATES: &[&str] = &["00", "01"];

/// Successful gateway answer.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    /// HTTP status.
    pub status: u16,
    /// Parsed JSON body; `Null` when the body was empty.
    pub body: Value,
    /// Gateway code carried by the body, if any.
    pub code: Option<String>,
    /// Correlation id sent with the request.
    pub request_id: Uuid,
}

/// Sends operations once and classifies failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher {
    timeout: Option<Duration>,
}

impl Dispatcher {
    /// Creates a dispatcher that honours each request's own timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self { timeout: None }
    }

    /// Overrides the timeout of every dispatched request.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self { timeout: Some(timeout) }
    }

    /// Dispatches `operation` once.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::ExpiredToken`] if `token` is no longer valid; nothing is sent
    /// - [`GatewayError::ApiCall`] classified as described in the module docs
    #[instrument(
        skip(self, operation, token, transport),
        fields(
            operation = %operation.operation_type(),
            protocol = transport.protocol_name(),
            request_id = tracing::field::Empty,
        )
    )]
    pub async fn call<T: Transport>(
        &self,
        operation: &Operation,
        token: &AccessToken,
        transport: &T,
    ) -> Result<GatewayResponse> {
        if !token.is_valid(Utc::now()) {
            warn!(expired_at = %token.expires_at(), "Refusing to dispatch with expired token");
            return Err(GatewayError::ExpiredToken { expired_at: token.expires_at() });
        }

        let request_id = Uuid::new_v4();
        tracing::Span::current().record("request_id", tracing::field::display(request_id));

        let mut request = operation.request().to_transport_request(token, request_id);
        if let Some(timeout) = self.timeout {
            request.timeout = timeout;
        }

        let result = send_once(transport, &request)
            .await
            .and_then(|response| interpret_response(&response, request_id));
        match &result {
            Ok(response) => {
                info!(status = response.status, code = ?response.code, "Gateway call succeeded");
            }
            Err(error) => {
                warn!(kind = ?error.api_call_kind(), error = %error, "Gateway call failed");
            }
        }
        result
    }
}

/// Sends `request` once, bounding the exchange by its timeout.
pub(crate) async fn send_once<T: Transport>(
    transport: &T,
    request: &TransportRequest,
) -> Result<TransportResponse> {
    match tokio::time::timeout(request.timeout, transport.send(request)).await {
        Err(_elapsed) => Err(GatewayError::api_call(
            ApiCallErrorKind::NetworkFailure,
            format!("no response within {:?}", request.timeout),
        )),
        Ok(Err(failure)) => Err(classify_failure(&failure)),
        Ok(Ok(response)) => Ok(response),
    }
}

/// A locally rejected request is a validation failure; every other
/// transport-level failure is a network failure.
pub(crate) fn classify_failure(failure: &TransportFailure) -> GatewayError {
    let kind = match failure {
        TransportFailure::Rejected(_) => ApiCallErrorKind::ValidationFailure,
        TransportFailure::Timeout | TransportFailure::Connect(_) | TransportFailure::Other(_) => {
            ApiCallErrorKind::NetworkFailure
        }
    };
    GatewayError::api_call(kind, failure.to_string())
}

/// Classifies a non-success status. Returns `None` for 2xx.
#[must_use]
pub fn classify_status(status: u16) -> Option<ApiCallErrorKind> {
    match status {
        200..=299 => None,
        401 | 403 => Some(ApiCallErrorKind::AuthFailure),
        408 => Some(ApiCallErrorKind::NetworkFailure),
        429 | 500..=599 => Some(ApiCallErrorKind::GatewayError),
        400..=499 => Some(ApiCallErrorKind::ValidationFailure),
        _ => Some(ApiCallErrorKind::GatewayError),
    }
}

/// Extracts the gateway code from `code` or `result.code`.
#[must_use]
pub fn extract_code(body: &Value) -> Option<String> {
    body.get("code")
        .or_else(|| body.pointer("/result/code"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn extract_message(body: &Value) -> Option<String> {
    body.get("message")
        .or_else(|| body.pointer("/result/message"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn parse_body(body: &[u8]) -> Option<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Some(Value::Null);
    }
    serde_json::from_slice(body).ok()
}

/// Turns an HTTP answer into a response or a classified error.
pub(crate) fn check_status(response: &TransportResponse) -> Result<Value> {
    let body = parse_body(&response.body);

    if let Some(kind) = classify_status(response.status) {
        let parsed = body.unwrap_or(Value::Null);
        return Err(GatewayError::ApiCall {
            kind,
            status: Some(response.status),
            code: extract_code(&parsed),
            message: extract_message(&parsed)
                .unwrap_or_else(|| format!("gateway answered HTTP {}", response.status)),
        });
    }

    body.ok_or_else(|| GatewayError::ApiCall {
        kind: ApiCallErrorKind::GatewayError,
        status: Some(response.status),
        code: None,
        message: "response body is not valid JSON".to_owned(),
    })
}

fn interpret_response(response: &TransportResponse, request_id: Uuid) -> Result<GatewayResponse> {
    let body = check_status(response)?;
    let code = extract_code(&body);

    if let Some(code) = &code
        && code.len() == 8
        && code.bytes().all(|b| b.is_ascii_digit())
        && !ACCEPTED_STATES.contains(&&code[..2])
    {
        return Err(GatewayError::ApiCall {
            kind: ApiCallErrorKind::ValidationFailure,
            status: Some(response.status),
            code: Some(code.clone()),
            message: extract_message(&body)
                .unwrap_or_else(|| "gateway refused the operation".to_owned()),
        });
    }

    Ok(GatewayResponse { status: response.status, body, code, request_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> TransportResponse {
        TransportResponse { status, body: body.as_bytes().to_vec(), headers: vec![] }
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(200), None);
        assert_eq!(classify_status(204), None);
        assert_eq!(classify_status(401), Some(ApiCallErrorKind::AuthFailure));
        assert_eq!(classify_status(403), Some(ApiCallErrorKind::AuthFailure));
        assert_eq!(classify_status(408), Some(ApiCallErrorKind::NetworkFailure));
        assert_eq!(classify_status(422), Some(ApiCallErrorKind::ValidationFailure));
        assert_eq!(classify_status(429), Some(ApiCallErrorKind::GatewayError));
        assert_eq!(classify_status(503), Some(ApiCallErrorKind::GatewayError));
        assert_eq!(classify_status(302), Some(ApiCallErrorKind::GatewayError));
    }

    #[test]
    fn test_extract_code_locations() {
        assert_eq!(
            extract_code(&serde_json::json!({"code": "00000000"})).as_deref(),
            Some("00000000")
        );
        assert_eq!(
            extract_code(&serde_json::json!({"result": {"code": "01001002"}})).as_deref(),
            Some("01001002")
        );
        assert_eq!(extract_code(&serde_json::json!({"status": "ok"})), None);
    }

    #[test]
    fn test_error_body_code_is_attached() {
        let err = check_status(&response(
            400,
            r#"{"result": {"code": "01002003", "message": "Invalid card expiry"}}"#,
        ))
        .unwrap_err();
        match err {
            GatewayError::ApiCall { kind, status, code, message } => {
                assert_eq!(kind, ApiCallErrorKind::ValidationFailure);
                assert_eq!(status, Some(400));
                assert_eq!(code.as_deref(), Some("01002003"));
                assert_eq!(message, "Invalid card expiry");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_json_error_body() {
        let err = check_status(&response(502, "<html>bad gateway</html>")).unwrap_err();
        assert_eq!(err.api_call_kind(), Some(ApiCallErrorKind::GatewayError));
        assert!(err.to_string().contains("HTTP 502"));
    }

    #[test]
    fn test_success_with_non_json_body_is_gateway_error() {
        let err = interpret_response(&response(200, "not json"), Uuid::new_v4()).unwrap_err();
        assert_eq!(err.api_call_kind(), Some(ApiCallErrorKind::GatewayError));
    }

    #[test]
    fn test_empty_success_body_is_null() {
        let ok = interpret_response(&response(204, ""), Uuid::new_v4()).unwrap();
        assert_eq!(ok.body, Value::Null);
        assert_eq!(ok.code, None);
    }

    #[test]
    fn test_business_refusal_on_success_status() {
        let err = interpret_response(
            &response(200, r#"{"code": "02001004", "message": "Card refused"}"#),
            Uuid::new_v4(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::ApiCall { kind: ApiCallErrorKind::ValidationFailure, code: Some(ref c), .. }
                if c == "02001004"
        ));
    }

    #[test]
    fn test_pending_code_is_not_a_refusal() {
        let ok = interpret_response(&response(202, r#"{"code": "01001000"}"#), Uuid::new_v4())
            .unwrap();
        assert_eq!(ok.code.as_deref(), Some("01001000"));
    }

    #[test]
    fn test_success_code_passes() {
        let id = Uuid::new_v4();
        let ok = interpret_response(
            &response(201, r#"{"code": "00000000", "payment": {"id": "pay_1"}}"#),
            id,
        )
        .unwrap();
        assert_eq!(ok.code.as_deref(), Some("00000000"));
        assert_eq!(ok.body["payment"]["id"], "pay_1");
        assert_eq!(ok.request_id, id);
    }

    #[test]
    fn test_transport_failures_are_network_failures() {
        for failure in [
            TransportFailure::Timeout,
            TransportFailure::Connect("refused".to_owned()),
            TransportFailure::Other("reset".to_owned()),
        ] {
            assert_eq!(
                classify_failure(&failure).api_call_kind(),
                Some(ApiCallErrorKind::NetworkFailure)
            );
        }
    }

    #[test]
    fn test_rejected_request_is_not_retryable() {
        let error =
            classify_failure(&TransportFailure::Rejected("only HTTPS URLs are allowed".to_owned()));
        assert_eq!(error.api_call_kind(), Some(ApiCallErrorKind::ValidationFailure));
        assert!(!error.is_retryable());
        assert!(error.to_string().contains("only HTTPS URLs are allowed"));
    }
}
