//! Request and event codecs

pub mod json;
pub mod jsonrpc;
pub mod sse;

pub use json::JsonCodec;
pub use jsonrpc::{JsonRpcCodec, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use sse::SseCodec;

use crate::{
    protocol::{error::A2AError, event::StreamEvent, operation::A2AOperation},
    service::response::A2AResponse,
};
use bytes::Bytes;

/// Wire encoding of operations for one protocol binding
///
/// `JsonRpcCodec` is the binding agents are called with; `JsonCodec` covers the plain
/// HTTP+JSON endpoints and the card documents.
pub trait Codec: Send + Sync {
    fn encode_request(&self, operation: &A2AOperation) -> Result<Bytes, A2AError>;

    /// Decode a buffered response body; `operation` decides the expected shape
    fn decode_response(
        &self,
        body: &[u8],
        operation: &A2AOperation,
    ) -> Result<A2AResponse, A2AError>;

    /// Decode the `data` payload of one server-sent event
    fn decode_event(&self, data: &str) -> Result<StreamEvent, A2AError>;

    fn content_type(&self) -> &str;

    /// Path the operation is sent to
    fn endpoint(&self, operation: &A2AOperation) -> String {
        operation.endpoint()
    }

    fn method(&self, operation: &A2AOperation) -> &'static str {
        operation.method()
    }
}
