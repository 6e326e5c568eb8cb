//! JSON codec for HTTP+JSON binding

use bytes::Bytes;
use serde_json::{json, Value};

use crate::{
    codec::Codec,
    protocol::{
        agent::AgentCard, error::A2AError, event::StreamEvent, message::Message,
        operation::A2AOperation, task::Task,
    },
    service::response::A2AResponse,
};

/// JSON codec for the HTTP+JSON protocol binding
#[derive(Debug, Clone, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec
    pub fn new() -> Self {
        Self
    }

    /// Request parameters shared with the JSON-RPC binding
    pub(crate) fn params(operation: &A2AOperation) -> Value {
        match operation {
            A2AOperation::SendMessage { message, .. } => json!({ "message": message }),
            A2AOperation::GetTask { task_id } | A2AOperation::CancelTask { task_id } => {
                json!({ "id": task_id })
            }
            A2AOperation::DiscoverAgent | A2AOperation::DiscoverExtendedAgent { .. } => {
                json!({})
            }
        }
    }

    /// Decode a result value for the given operation
    pub(crate) fn decode_value(
        value: Value,
        operation: &A2AOperation,
    ) -> Result<A2AResponse, A2AError> {
        match operation {
            A2AOperation::SendMessage { stream: true, .. } => Err(A2AError::Protocol(
                "Streaming responses must be read as an event stream".into(),
            )),
            A2AOperation::SendMessage { .. } => {
                // A non-streaming send may answer with a task or a direct message
                if value.get("kind").and_then(Value::as_str) == Some("message") {
                    let message: Message = serde_json::from_value(value)?;
                    Ok(A2AResponse::Message(Box::new(message)))
                } else {
                    let task: Task = serde_json::from_value(value)?;
                    Ok(A2AResponse::Task(Box::new(task)))
                }
            }
            A2AOperation::GetTask { .. } | A2AOperation::CancelTask { .. } => {
                let task: Task = serde_json::from_value(value)?;
                Ok(A2AResponse::Task(Box::new(task)))
            }
            A2AOperation::DiscoverAgent | A2AOperation::DiscoverExtendedAgent { .. } => {
                let card: AgentCard = serde_json::from_value(value)?;
                Ok(A2AResponse::AgentCard(Box::new(card)))
            }
        }
    }
}

impl Codec for JsonCodec {
    fn encode_request(&self, operation: &A2AOperation) -> Result<Bytes, A2AError> {
        let bytes = serde_json::to_vec(&Self::params(operation))?;
        Ok(Bytes::from(bytes))
    }

    fn decode_response(
        &self,
        body: &[u8],
        operation: &A2AOperation,
    ) -> Result<A2AResponse, A2AError> {
        // Empty responses
        if body.is_empty() {
            return Ok(A2AResponse::Empty);
        }

        let value: Value = serde_json::from_slice(body)?;
        Self::decode_value(value, operation)
    }

    fn decode_event(&self, data: &str) -> Result<StreamEvent, A2AError> {
        serde_json::from_str(data)
            .map_err(|e| A2AError::Protocol(format!("Failed to parse SSE event data: {}", e)))
    }

    fn content_type(&self) -> &str {
        "application/json"
    }
}
