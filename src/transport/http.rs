//! Transport for remote agents over HTTP

use std::{
    task::{Context, Poll},
    time::Duration,
};

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use url::Url;

use crate::protocol::error::A2AError;

use super::{ByteStream, Transport, TransportRequest, TransportResponse};

/// Default time allowed to establish a connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed between two reads on a response body
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwest-backed transport; one client per agent URL
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Transport with the default timeouts
    pub fn new(base_url: Url) -> Self {
        let client = Self::client_with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT)
            .unwrap_or_default();
        Self { client, base_url }
    }

    fn client_with_timeouts(
        connect: Duration,
        read: Duration,
    ) -> Result<reqwest::Client, A2AError> {
        reqwest::Client::builder()
            .connect_timeout(connect)
            .read_timeout(read)
            .build()
            .map_err(A2AError::from)
    }

    /// Full URL for an endpoint, without doubling the separator
    fn url_for(&self, endpoint: &str) -> String {
        format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            endpoint
        )
    }

    fn request_builder(
        &self,
        request: TransportRequest,
    ) -> Result<reqwest::RequestBuilder, A2AError> {
        let url = self.url_for(&request.endpoint);

        let mut req_builder = match request.method.as_str() {
            "POST" => self.client.post(&url),
            "GET" => self.client.get(&url),
            _ => {
                return Err(A2AError::Transport(format!(
                    "Unsupported HTTP method: {}",
                    request.method
                )))
            }
        };

        for (key, value) in request.headers {
            req_builder = req_builder.header(key, value);
        }

        if !request.body.is_empty() {
            req_builder = req_builder.body(request.body);
        }

        Ok(req_builder)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), A2AError>> {
        // HTTP client is always ready
        Poll::Ready(Ok(()))
    }

    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, A2AError> {
        let response = self.request_builder(request)?.send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();

        let body = response.bytes().await?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }

    async fn execute_streaming(&self, request: TransportRequest) -> Result<ByteStream, A2AError> {
        let endpoint = request.endpoint.clone();
        let response = self
            .request_builder(request.header("Accept", "text/event-stream"))?
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return match status.as_u16() {
                401 | 403 => Err(A2AError::Auth(body)),
                _ => Err(A2AError::Transport(format!(
                    "HTTP streaming request to {} failed with status {}: {}",
                    endpoint, status, body
                ))),
            };
        }

        Ok(response.bytes_stream().map_err(A2AError::from).boxed())
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn with_timeouts(self, connect: Duration, read: Duration) -> Result<Self, A2AError> {
        Ok(Self {
            client: Self::client_with_timeouts(connect, read)?,
            base_url: self.base_url,
        })
    }
}
