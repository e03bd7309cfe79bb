//! Access tokens and credential exchange.
//!
//! [`TokenManager::get_access_token`] exchanges [`MerchantCredentials`] for an
//! [`AccessToken`] using the OAuth2 client credentials grant. The manager keeps
//! no state between calls: tokens belong to the caller, who decides when to
//! refresh and where to persist them.
//!
//! Validity has no grace period. A token is valid strictly before its expiry
//! instant and invalid from that instant on.
//!
//! ```
//! use chrono::{TimeDelta, Utc};
//! use gateway_bridge::token::AccessToken;
//!
//! let now = Utc::now();
//! let token = AccessToken::new("tok_123", "Bearer", now + TimeDelta::seconds(60), None);
//!
//! assert!(token.is_valid(now));
//! assert!(!token.is_valid(token.expires_at()));
//! ```

use std::{fmt, time::Duration};

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use tracing::{info, instrument};
use url::Url;
use zeroize::Zeroizing;

use crate::{
    config::{ClientConfig, MerchantCredentials},
    dispatch,
    error::{ApiCallErrorKind, GatewayError, Result},
    transport::{Method, Transport, TransportRequest},
};

/// Form body of the client credentials grant.
const GRANT_BODY: &[u8] = b"grant_type=client_credentials";

/// Short-lived bearer credential.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    token: Zeroizing<String>,
    token_type: String,
    expires_at: DateTime<Utc>,
    scope: Option<String>,
}

impl AccessToken {
    /// Creates a token, e.g. when restoring one the caller persisted.
    #[must_use]
    pub fn new(
        token: impl Into<String>,
        token_type: impl Into<String>,
        expires_at: DateTime<Utc>,
        scope: Option<String>,
    ) -> Self {
        Self {
            token: Zeroizing::new(token.into()),
            token_type: token_type.into(),
            expires_at,
            scope,
        }
    }

    /// Raw token value.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Token type as declared by the gateway.
    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Instant from which the token is no longer valid.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Granted scope, if the gateway declared one.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Returns true iff `now` is strictly before the expiry instant.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// `Authorization` header value, e.g. `Bearer abc`.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        let scheme =
            if self.token_type.eq_ignore_ascii_case("bearer") { "Bearer" } else { &self.token_type };
        format!("{scheme} {}", self.token.as_str())
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Credential exchange answer.
#[derive(Deserialize)]
pub struct TokenGrant {
    /// Token value.
    pub access_token: String,
    /// Token type, usually `Bearer`.
    pub token_type: String,
    /// Lifetime in seconds, relative to acquisition.
    pub expires_in: i64,
    /// Granted scope.
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenGrant {
    /// Converts the relative lifetime into an absolute expiry.
    ///
    /// # Errors
    ///
    /// Returns a [`ApiCallErrorKind::ValidationFailure`] API error if the token
    /// is empty or the lifetime is not positive or out of range.
    pub fn into_access_token(self, acquired_at: DateTime<Utc>) -> Result<AccessToken> {
        let invalid = |message: &str| {
            GatewayError::api_call(ApiCallErrorKind::ValidationFailure, message.to_owned())
        };
        if self.access_token.is_empty() {
            return Err(invalid("credential exchange returned an empty access token"));
        }
        if self.expires_in <= 0 {
            return Err(invalid("credential exchange returned a non-positive expires_in"));
        }
        let expires_at = TimeDelta::try_seconds(self.expires_in)
            .and_then(|lifetime| acquired_at.checked_add_signed(lifetime))
            .ok_or_else(|| invalid("credential exchange returned an out of range expires_in"))?;
        Ok(AccessToken::new(self.access_token, self.token_type, expires_at, self.scope))
    }
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Exchanges merchant credentials for access tokens.
#[derive(Debug, Clone)]
pub struct TokenManager {
    token_url: Url,
    timeout: Duration,
}

impl TokenManager {
    /// Creates a manager posting to `token_url`.
    #[must_use]
    pub const fn new(token_url: Url, timeout: Duration) -> Self {
        Self { token_url, timeout }
    }

    /// Creates a manager from client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if the token URL cannot be resolved.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Ok(Self::new(config.token_url()?, config.dispatch_timeout()))
    }

    /// Credential exchange endpoint.
    #[must_use]
    pub const fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// Returns true iff `token` is valid at `now`.
    #[must_use]
    pub fn is_valid(token: &AccessToken, now: DateTime<Utc>) -> bool {
        token.is_valid(now)
    }

    /// Performs one credential exchange.
    ///
    /// The expiry is computed from the instant the request was sent.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ApiCall`] classified like any dispatched call;
    /// a malformed answer is a [`ApiCallErrorKind::GatewayError`].
    #[instrument(
        skip(self, credentials, transport),
        fields(merchant_id = credentials.merchant_id(), url = %self.token_url)
    )]
    pub async fn get_access_token<T: Transport>(
        &self,
        credentials: &MerchantCredentials,
        transport: &T,
    ) -> Result<AccessToken> {
        let request = self.exchange_request(credentials);
        let acquired_at = Utc::now();

        let response = dispatch::send_once(transport, &request).await?;
        let body = dispatch::check_status(&response)?;

        let grant: TokenGrant = serde_json::from_value(body).map_err(|e| GatewayError::ApiCall {
            kind: ApiCallErrorKind::GatewayError,
            status: Some(response.status),
            code: None,
            message: format!("malformed credential exchange answer: {e}"),
        })?;
        let token = grant.into_access_token(acquired_at)?;

        info!(expires_at = %token.expires_at(), scope = ?token.scope(), "Acquired access token");
        Ok(token)
    }

    fn exchange_request(&self, credentials: &MerchantCredentials) -> TransportRequest {
        let (merchant_id, api_key) = (credentials.merchant_id(), credentials.api_key());
        // Sized up front so no growth leaves an unwiped copy behind.
        let mut pair =
            Zeroizing::new(String::with_capacity(merchant_id.len() + 1 + api_key.len()));
        pair.push_str(merchant_id);
        pair.push(':');
        pair.push_str(api_key);
        let mut header = Zeroizing::new(String::with_capacity(6 + pair.len().div_ceil(3) * 4));
        header.push_str("Basic ");
        STANDARD.encode_string(pair.as_bytes(), &mut *header);
        // The request wipes its Authorization value when dropped.
        let basic = std::mem::take(&mut *header);
        TransportRequest {
            method: Method::Post,
            url: self.token_url.clone(),
            headers: vec![
                ("Authorization".to_owned(), basic),
                ("Content-Type".to_owned(), "application/x-www-form-urlencoded".to_owned()),
                ("Accept".to_owned(), "application/json".to_owned()),
            ],
            body: Some(GRANT_BODY.to_vec()),
            timeout: self.timeout,
        }
    }
}
