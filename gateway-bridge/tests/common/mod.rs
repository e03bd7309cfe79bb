//! Scripted transport and fixtures shared by the integration tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::{collections::VecDeque, sync::Mutex, time::Duration};

use chrono::{TimeDelta, Utc};
use gateway_bridge::{
    GatewayClient,
    config::ClientConfig,
    token::AccessToken,
    transport::{Transport, TransportFailure, TransportRequest, TransportResponse},
};

/// One scripted transport outcome.
#[derive(Debug, Clone)]
pub enum Scripted {
    Response { status: u16, body: String },
    Failure(TransportFailure),
}

impl Scripted {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::Response { status, body: body.to_string() }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        Self::Response { status, body: body.to_owned() }
    }
}

/// Transport that answers from a script and records every request it sees.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<TransportRequest>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Waits `delay` before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for MockTransport {
    fn send<'a>(
        &'a self,
        request: &'a TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportFailure>> + Send + 'a {
        async move {
            self.requests.lock().unwrap().push(request.clone());
            let next = self.script.lock().unwrap().pop_front();
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match next {
                Some(Scripted::Response { status, body }) => Ok(TransportResponse {
                    status,
                    body: body.into_bytes(),
                    headers: vec![("Content-Type".to_owned(), "application/json".to_owned())],
                }),
                Some(Scripted::Failure(failure)) => Err(failure),
                None => Err(TransportFailure::Other("script exhausted".to_owned())),
            }
        }
    }

    fn protocol_name(&self) -> &'static str {
        "mock"
    }
}

pub fn client() -> GatewayClient {
    GatewayClient::new(ClientConfig::default()).unwrap()
}

pub fn valid_token() -> AccessToken {
    AccessToken::new(
        "live-token".to_owned(),
        "Bearer".to_owned(),
        Utc::now() + TimeDelta::minutes(30),
        Some("payments".to_owned()),
    )
}

pub fn expired_token() -> AccessToken {
    AccessToken::new(
        "stale-token".to_owned(),
        "Bearer".to_owned(),
        Utc::now() - TimeDelta::seconds(1),
        None,
    )
}
