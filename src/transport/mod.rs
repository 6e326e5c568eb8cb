//! Byte-level transports underneath the client service stack

pub mod http;
pub mod local;
#[cfg(test)]
pub mod mock;

use std::{
    collections::HashMap,
    task::{Context, Poll},
    time::Duration,
};

pub use http::HttpTransport;
pub use local::LocalTransport;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use url::Url;

use crate::protocol::error::A2AError;

/// Raw body chunks of a streaming response
pub type ByteStream = BoxStream<'static, Result<Bytes, A2AError>>;

/// Encoded request addressed relative to the agent's base URL
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Path such as `/` or `/.well-known/agent-card.json`
    pub endpoint: String,

    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl TransportRequest {
    pub fn new(endpoint: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: method.into(),
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Bearer token from the `Authorization` header, if any
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("authorization"))
            .and_then(|(_, v)| v.strip_prefix("Bearer "))
    }
}

/// Buffered response with an HTTP-style status
#[derive(Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Moves encoded requests to an agent and raw responses back
///
/// Implemented over HTTP for remote agents and in-process for a local `RequestHandler`.
#[async_trait]
pub trait Transport: Clone + Send + Sync + 'static {
    /// Readiness for the next request, surfaced through `Service::poll_ready`
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), A2AError>>;

    /// Send one request and buffer the whole response
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, A2AError>;

    /// Send one request whose response body is a long-lived event stream
    ///
    /// Dropping the returned stream must release the underlying connection.
    async fn execute_streaming(&self, request: TransportRequest) -> Result<ByteStream, A2AError>;

    fn base_url(&self) -> &Url;

    /// Apply connect and read timeouts
    ///
    /// Transports without a network connection keep their defaults.
    fn with_timeouts(self, _connect: Duration, _read: Duration) -> Result<Self, A2AError> {
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_lookup() {
        let req = TransportRequest::new("/", "GET").header("authorization", "Bearer abc");
        assert_eq!(req.bearer_token(), Some("abc"));

        let req = TransportRequest::new("/", "GET").header("Authorization", "Basic xyz");
        assert_eq!(req.bearer_token(), None);
    }

    #[test]
    fn test_response_builder() {
        let resp = TransportResponse::new(200)
            .header("Content-Type", "application/json")
            .body(Bytes::from_static(b"{}"));

        assert_eq!(
            resp.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(&resp.body[..], b"{}");
    }

    #[test]
    fn test_response_status() {
        assert!(TransportResponse::new(204).is_success());
        assert!(!TransportResponse::new(401).is_success());
    }
}
