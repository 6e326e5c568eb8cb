//! JSON-RPC 2.0 codec for A2A protocol
//!
//! This codec wraps A2A operations in JSON-RPC 2.0 envelopes posted to the agent's
//! base path. Card discovery stays a plain `GET` in this binding. The envelope types
//! are public so a server can decode requests and build replies with them.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    codec::Codec,
    protocol::{error::A2AError, event::StreamEvent, operation::A2AOperation, task::TaskState},
    service::response::A2AResponse,
};

use super::json::JsonCodec;

pub const METHOD_SEND: &str = "message/send";
pub const METHOD_STREAM: &str = "message/stream";
pub const METHOD_GET_TASK: &str = "tasks/get";
pub const METHOD_CANCEL_TASK: &str = "tasks/cancel";
pub const METHOD_EXTENDED_CARD: &str = "agent/getAuthenticatedExtendedCard";

/// JSON-RPC 2.0 request envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub id: Value,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id: Value::String(Uuid::now_v7().to_string()),
        }
    }
}

/// JSON-RPC 2.0 response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

impl JsonRpcResponse {
    /// Successful reply
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Error reply built from a server-side error
    pub fn failure(id: Value, error: &A2AError) -> Self {
        Self::error(id, JsonRpcError::from_error(error))
    }

    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Unwrap the result, turning an error object into an `A2AError`
    pub fn into_result(self) -> Result<Value, A2AError> {
        if let Some(error) = self.error {
            return Err(error.into_error());
        }

        self.result.ok_or_else(|| {
            A2AError::Protocol("JSON-RPC response missing 'result' field".to_string())
        })
    }
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(-32601, format!("Method not found: {}", method))
    }

    pub fn from_error(error: &A2AError) -> Self {
        let data = match error {
            A2AError::TaskNotFound { task_id } => Some(json!({ "taskId": task_id })),
            A2AError::TaskNotCancelable { task_id, state } => {
                Some(json!({ "taskId": task_id, "state": state }))
            }
            _ => None,
        };

        let message = match error {
            A2AError::Validation(m) | A2AError::Auth(m) | A2AError::Protocol(m) => m.clone(),
            other => other.to_string(),
        };

        Self {
            code: error.jsonrpc_code(),
            message,
            data,
        }
    }

    /// Map a received error object back onto the crate error type
    pub fn into_error(self) -> A2AError {
        let task_id = self
            .data
            .as_ref()
            .and_then(|d| d.get("taskId"))
            .and_then(Value::as_str)
            .map(str::to_string);

        match (self.code, task_id) {
            (-32001, Some(task_id)) => A2AError::TaskNotFound { task_id },
            (-32002, Some(task_id)) => {
                let state = self
                    .data
                    .as_ref()
                    .and_then(|d| d.get("state"))
                    .and_then(|s| serde_json::from_value::<TaskState>(s.clone()).ok());
                match state {
                    Some(state) => A2AError::TaskNotCancelable { task_id, state },
                    None => A2AError::Protocol(self.message),
                }
            }
            (-32003, _) => A2AError::Auth(self.message),
            (-32602, _) => A2AError::Validation(self.message),
            (code, _) => A2AError::Protocol(format!("JSON-RPC error {}: {}", code, self.message)),
        }
    }
}

/// Path JSON-RPC requests are posted to, relative to the agent URL
pub const RPC_PATH: &str = "/";

/// JSON-RPC 2.0 binding; card discovery stays on its plain GET paths
#[derive(Debug, Clone, Default)]
pub struct JsonRpcCodec;

impl JsonRpcCodec {
    pub fn new() -> Self {
        Self
    }

    /// Map an A2A operation to a JSON-RPC method name
    pub fn operation_to_method(operation: &A2AOperation) -> &'static str {
        match operation {
            A2AOperation::SendMessage { stream: false, .. } => METHOD_SEND,
            A2AOperation::SendMessage { stream: true, .. } => METHOD_STREAM,
            A2AOperation::GetTask { .. } => METHOD_GET_TASK,
            A2AOperation::CancelTask { .. } => METHOD_CANCEL_TASK,
            A2AOperation::DiscoverAgent | A2AOperation::DiscoverExtendedAgent { .. } => {
                METHOD_EXTENDED_CARD
            }
        }
    }
}

impl Codec for JsonRpcCodec {
    fn encode_request(&self, operation: &A2AOperation) -> Result<Bytes, A2AError> {
        if operation.is_discovery() {
            return Ok(Bytes::new());
        }

        let request = JsonRpcRequest::new(
            Self::operation_to_method(operation),
            JsonCodec::params(operation),
        );

        let bytes = serde_json::to_vec(&request)?;
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

        // Cards are served without an envelope
        if operation.is_discovery() {
            return JsonCodec.decode_response(body, operation);
        }

        let envelope: JsonRpcResponse = serde_json::from_slice(body)
            .map_err(|e| A2AError::Protocol(format!("Failed to parse JSON-RPC response: {}", e)))?;

        JsonCodec::decode_value(envelope.into_result()?, operation)
    }

    fn decode_event(&self, data: &str) -> Result<StreamEvent, A2AError> {
        let envelope: JsonRpcResponse = serde_json::from_str(data)
            .map_err(|e| A2AError::Protocol(format!("Failed to parse SSE event data: {}", e)))?;

        let result = envelope.into_result()?;
        serde_json::from_value(result)
            .map_err(|e| A2AError::Protocol(format!("Unknown stream event: {}", e)))
    }

    fn content_type(&self) -> &str {
        "application/json"
    }

    fn endpoint(&self, operation: &A2AOperation) -> String {
        if operation.is_discovery() {
            operation.endpoint()
        } else {
            RPC_PATH.to_string()
        }
    }

    fn method(&self, operation: &A2AOperation) -> &'static str {
        if operation.is_discovery() {
            "GET"
        } else {
            "POST"
        }
    }
}
