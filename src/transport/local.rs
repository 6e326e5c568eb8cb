//! In-process transport mounting a [`RequestHandler`]
//!
//! Requests never touch the network but still go through the full wire format:
//! JSON-RPC bodies in, JSON or SSE frames out. Useful for embedding agents in the
//! same process as their caller and for end-to-end tests.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde::Serialize;
use serde_json::json;
use url::Url;

use crate::{
    codec::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, SseCodec},
    protocol::{
        error::A2AError,
        operation::{AGENT_CARD_PATH, EXTENDED_AGENT_CARD_PATH},
    },
    server::{JsonRpcReply, RequestHandler},
    transport::{ByteStream, Transport, TransportRequest, TransportResponse},
};

/// Transport that serves requests from an in-process [`RequestHandler`]
#[derive(Clone)]
pub struct LocalTransport {
    handler: Arc<RequestHandler>,
    base_url: Url,
    extended_card_path: String,
    requests: Arc<AtomicUsize>,
}

impl LocalTransport {
    pub fn new(handler: Arc<RequestHandler>, base_url: Url) -> Self {
        Self {
            handler,
            base_url,
            extended_card_path: EXTENDED_AGENT_CARD_PATH.to_string(),
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Serve the extended card from another path
    pub fn with_extended_card_path(mut self, path: impl Into<String>) -> Self {
        self.extended_card_path = path.into();
        self
    }

    pub fn handler(&self) -> &Arc<RequestHandler> {
        &self.handler
    }

    /// Requests served so far, across clones
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn parse_rpc(body: &[u8]) -> Result<JsonRpcRequest, JsonRpcResponse> {
        serde_json::from_slice(body).map_err(|e| {
            JsonRpcResponse::error(
                serde_json::Value::Null,
                JsonRpcError::new(-32700, format!("Parse error: {}", e)),
            )
        })
    }
}

fn json_response<T: Serialize>(status: u16, body: &T) -> Result<TransportResponse, A2AError> {
    Ok(TransportResponse::new(status)
        .header("Content-Type", "application/json")
        .body(Bytes::from(serde_json::to_vec(body)?)))
}

#[async_trait]
impl Transport for LocalTransport {
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), A2AError>> {
        Poll::Ready(Ok(()))
    }

    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, A2AError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        match request.method.as_str() {
            "GET" if request.endpoint == AGENT_CARD_PATH => {
                json_response(200, &self.handler.agent_card())
            }
            "GET" if request.endpoint == self.extended_card_path => {
                match self.handler.extended_agent_card(request.bearer_token()) {
                    Ok(card) => json_response(200, &card),
                    Err(e) => json_response(401, &json!({ "message": e.to_string() })),
                }
            }
            "POST" => {
                let rpc = match Self::parse_rpc(&request.body) {
                    Ok(rpc) => rpc,
                    Err(reply) => return json_response(200, &reply),
                };

                match self.handler.handle_jsonrpc(rpc, request.bearer_token()).await {
                    JsonRpcReply::Single(reply) => json_response(200, &reply),
                    JsonRpcReply::Stream(_) => Err(A2AError::Protocol(
                        "Streaming method called without a streaming request".into(),
                    )),
                }
            }
            _ => json_response(
                404,
                &json!({ "message": format!("No route for {} {}", request.method, request.endpoint) }),
            ),
        }
    }

    async fn execute_streaming(&self, request: TransportRequest) -> Result<ByteStream, A2AError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if request.method != "POST" {
            return Err(A2AError::Transport(format!(
                "Streaming requires POST, got {}",
                request.method
            )));
        }

        let codec = SseCodec::new();
        let replies = match Self::parse_rpc(&request.body) {
            Ok(rpc) => self.handler.handle_jsonrpc(rpc, request.bearer_token()).await,
            Err(reply) => JsonRpcReply::Single(reply),
        };

        // Errors are answered as a single frame, like an SSE server that fails early.
        let replies = match replies {
            JsonRpcReply::Stream(stream) => stream,
            JsonRpcReply::Single(reply) => futures::stream::iter([reply]).boxed(),
        };

        Ok(replies
            .map(move |reply| codec.encode_frame(&reply))
            .boxed())
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }
}
