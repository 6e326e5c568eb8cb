//! Innermost service of the client stack: operation in, decoded response out

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::StreamExt;
use serde_json::Value;
use tower_service::Service;

use crate::{
    codec::{Codec, JsonRpcError, SseCodec},
    protocol::error::A2AError,
    service::{A2ARequest, A2AResponse},
    transport::{Transport, TransportRequest, TransportResponse},
};

/// Encodes operations with a codec and sends them over a transport
///
/// Streaming operations resolve to `A2AResponse::Stream` as soon as the response
/// head arrives; events are decoded lazily as the caller polls.
pub struct A2AProtocolService<T> {
    transport: T,
    codec: Arc<dyn Codec>,
}

impl<T> A2AProtocolService<T>
where
    T: Transport,
{
    pub fn new(transport: T, codec: Arc<dyn Codec>) -> Self {
        Self { transport, codec }
    }

    fn encode(req: &A2ARequest, codec: &dyn Codec) -> Result<TransportRequest, A2AError> {
        let method = codec.method(&req.operation);
        let accept = if req.operation.is_streaming() {
            "text/event-stream"
        } else {
            codec.content_type()
        };

        let mut transport_req = TransportRequest::new(codec.endpoint(&req.operation), method)
            .header("Content-Type", codec.content_type())
            .header("Accept", accept);

        if let Some(auth) = &req.context.auth {
            let (header, value) = auth.to_header();
            transport_req = transport_req.header(header, value);
        }

        let body = codec.encode_request(&req.operation)?;
        if !body.is_empty() && method != "GET" {
            transport_req = transport_req.body(body);
        }

        Ok(transport_req)
    }
}

/// Map a non-2xx response onto the crate error type
///
/// A JSON-RPC error object in the body is preferred over the bare status code.
fn status_error(resp: &TransportResponse) -> A2AError {
    let body = serde_json::from_slice::<Value>(&resp.body).ok();

    if let Some(rpc) = body
        .as_ref()
        .and_then(|json| json.get("error"))
        .and_then(|error| serde_json::from_value::<JsonRpcError>(error.clone()).ok())
    {
        return rpc.into_error();
    }

    let message = body
        .as_ref()
        .and_then(|json| json.get("message"))
        .and_then(Value::as_str);

    match (resp.status, message) {
        (401 | 403, Some(message)) => A2AError::Auth(message.to_string()),
        (401 | 403, None) => A2AError::Auth(format!("HTTP {}", resp.status)),
        (404, _) => match body
            .as_ref()
            .and_then(|json| json.get("taskId"))
            .and_then(Value::as_str)
        {
            Some(task_id) => A2AError::TaskNotFound {
                task_id: task_id.to_string(),
            },
            None => A2AError::Protocol(format!(
                "HTTP 404: {}",
                message.unwrap_or("endpoint not found")
            )),
        },
        (status, Some(message)) => A2AError::Transport(format!("HTTP {}: {}", status, message)),
        (status, None) => A2AError::Transport(format!("HTTP error: {}", status)),
    }
}

impl<T> Service<A2ARequest> for A2AProtocolService<T>
where
    T: Transport + Clone,
{
    type Response = A2AResponse;
    type Error = A2AError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.transport.poll_ready(cx)
    }

    fn call(&mut self, req: A2ARequest) -> Self::Future {
        let transport = self.transport.clone();
        let codec = self.codec.clone();

        Box::pin(async move {
            let request = req.describe();
            let transport_req = Self::encode(&req, codec.as_ref())?;
            tracing::debug!(
                agent_url = %req.context.agent_url,
                request = %request,
                endpoint = %transport_req.endpoint,
                "sending agent request"
            );

            if req.operation.is_streaming() {
                let bytes = transport.execute_streaming(transport_req).await?;
                let events = SseCodec::new().parse_stream(bytes, codec);
                return Ok(A2AResponse::Stream(events.boxed()));
            }

            let resp = transport.execute(transport_req).await?;
            if !resp.is_success() {
                let error = status_error(&resp);
                tracing::warn!(
                    request = %request,
                    status = resp.status,
                    error = %error,
                    "agent request failed"
                );
                return Err(error);
            }

            codec.decode_response(&resp.body, &req.operation)
        })
    }
}

impl<T> Clone for A2AProtocolService<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            codec: self.codec.clone(),
        }
    }
}
