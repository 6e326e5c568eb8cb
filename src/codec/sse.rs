//! Server-Sent Events (SSE) codec for streaming A2A responses
//!
//! Each `data:` field carries one event encoded by the active [`Codec`]
//! (a JSON-RPC 2.0 response for the default binding).

use std::sync::Arc;

use bytes::Bytes;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::{Stream, StreamExt};
use serde::Serialize;

use crate::{
    codec::Codec,
    protocol::{error::A2AError, event::StreamEvent},
};

/// SSE codec for parsing and framing streaming responses
#[derive(Debug, Clone, Default)]
pub struct SseCodec;

impl SseCodec {
    /// Create a new SSE codec
    pub fn new() -> Self {
        Self
    }

    /// Parse an SSE byte stream into a stream of events
    ///
    /// Transport errors from the underlying byte stream pass through unchanged, so a
    /// read timeout still surfaces as `A2AError::Timeout`. Frames with an empty data
    /// field (keep-alives) are skipped.
    pub fn parse_stream<S>(
        &self,
        byte_stream: S,
        codec: Arc<dyn Codec>,
    ) -> impl Stream<Item = Result<StreamEvent, A2AError>> + Send + 'static
    where
        S: Stream<Item = Result<Bytes, A2AError>> + Send + 'static,
    {
        byte_stream.eventsource().filter_map(move |result| {
            let codec = codec.clone();
            async move {
                match result {
                    Ok(event) if event.data.trim().is_empty() => None,
                    Ok(event) => Some(codec.decode_event(&event.data)),
                    Err(EventStreamError::Transport(e)) => Some(Err(e)),
                    Err(e) => Some(Err(A2AError::Protocol(format!("SSE stream error: {}", e)))),
                }
            }
        })
    }

    /// Frame one payload as an SSE event
    pub fn encode_frame<T: Serialize>(&self, payload: &T) -> Result<Bytes, A2AError> {
        let data = serde_json::to_string(payload)?;
        Ok(Bytes::from(format!("data: {}\n\n", data)))
    }
}

#[cfg(test)]
mod tests {
    use futures::{pin_mut, StreamExt};

    use super::*;
    use crate::codec::{JsonRpcCodec, JsonRpcResponse};

    fn byte_stream(
        chunks: Vec<&'static str>,
    ) -> impl Stream<Item = Result<Bytes, A2AError>> + Send + 'static {
        futures::stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
    }

    #[tokio::test]
    async fn test_parse_sse_stream() {
        let codec = SseCodec;

        let sse_data = "data: {\"jsonrpc\":\"2.0\",\"id\":\"1\",\"result\":{\"kind\":\"status-update\",\"taskId\":\"t\",\"contextId\":\"c\",\"status\":{\"state\":\"working\",\"timestamp\":\"2024-01-01T00:00:00Z\"}}}\n\n\
                        data: {\"jsonrpc\":\"2.0\",\"id\":\"1\",\"result\":{\"kind\":\"status-update\",\"taskId\":\"t\",\"contextId\":\"c\",\"final\":true,\"status\":{\"state\":\"failed\",\"timestamp\":\"2024-01-01T00:00:00Z\",\"message\":{\"messageId\":\"m\",\"role\":\"agent\",\"parts\":[{\"kind\":\"text\",\"text\":\"no\"}]}}}}\n\n";

        let event_stream = codec.parse_stream(byte_stream(vec![sse_data]), Arc::new(JsonRpcCodec::new()));
        pin_mut!(event_stream);

        let event1 = event_stream.next().await.unwrap().unwrap();
        assert_eq!(event1.kind(), "status-update");
        assert!(!event1.is_final());

        let event2 = event_stream.next().await.unwrap().unwrap();
        assert!(event2.is_final());

        assert!(event_stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_frames_split_across_chunks() {
        let codec = SseCodec;
        let event_stream = codec.parse_stream(
            byte_stream(vec![
                ": keep-alive\n\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"res",
                "ult\":{\"kind\":\"message\",\"messageId\":\"m\",\"role\":\"agent\",\"parts\":[]}}\n\n",
            ]),
            Arc::new(JsonRpcCodec::new()),
        );
        pin_mut!(event_stream);

        let event = event_stream.next().await.unwrap().unwrap();
        assert_eq!(event.kind(), "message");
        assert!(event_stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_parse_sse_error() {
        let codec = SseCodec;

        let sse_data = "data: {\"jsonrpc\":\"2.0\",\"error\":{\"code\":-32600,\"message\":\"Invalid Request\"},\"id\":\"1\"}\n\n";

        let event_stream = codec.parse_stream(byte_stream(vec![sse_data]), Arc::new(JsonRpcCodec::new()));
        pin_mut!(event_stream);

        match event_stream.next().await.unwrap() {
            Err(A2AError::Protocol(msg)) => assert!(msg.contains("Invalid Request")),
            other => panic!("Expected Protocol error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_error_passes_through() {
        let codec = SseCodec;
        let failing = futures::stream::iter(vec![Err::<Bytes, _>(A2AError::Timeout)]);

        let event_stream = codec.parse_stream(failing, Arc::new(JsonRpcCodec::new()));
        pin_mut!(event_stream);

        assert!(matches!(
            event_stream.next().await.unwrap(),
            Err(A2AError::Timeout)
        ));
    }

    #[test]
    fn test_encode_frame() {
        let frame = SseCodec
            .encode_frame(&JsonRpcResponse::success(serde_json::json!(7), serde_json::json!({"ok": true})))
            .unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("data: {"));
        assert!(text.ends_with("}\n\n"));
    }
}
