//! Error types for A2A protocol operations

use std::path::PathBuf;

use thiserror::Error;

use super::task::TaskState;

/// Main error type for A2A protocol operations
#[derive(Debug, Error)]
pub enum A2AError {
    /// Transport-level error (network, connection, etc.)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Protocol-level error (malformed frame, stream ended early, etc.)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Validation error (invalid request, payload or decision list)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Authentication or authorization error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Request timeout error
    #[error("Request timeout")]
    Timeout,

    /// Task not found error
    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: String },

    /// The task already reached a terminal state and cannot be canceled
    #[error("Task {task_id} cannot be canceled in state {state}")]
    TaskNotCancelable { task_id: String, state: TaskState },

    /// The task already emitted its final event
    #[error("Task {task_id} already emitted its final event")]
    TaskFinalized { task_id: String },

    /// The remote task ended in `failed` or `canceled`
    #[error("Remote task {state}: {message}")]
    RemoteTask { state: TaskState, message: String },

    /// No agent with this name is registered
    #[error("Agent not found: {name}")]
    AgentNotFound { name: String },

    /// The decision source kept answering interrupts past the configured cap
    #[error("Interrupt limit exceeded after {rounds} rounds")]
    InterruptLimitExceeded { rounds: usize },

    /// A referenced file could not be read
    #[error("Failed to read file {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

impl A2AError {
    /// JSON-RPC error code used when this error is reported by a server
    pub fn jsonrpc_code(&self) -> i64 {
        match self {
            A2AError::TaskNotFound { .. } => -32001,
            A2AError::TaskNotCancelable { .. } | A2AError::TaskFinalized { .. } => -32002,
            A2AError::Auth(_) => -32003,
            A2AError::Validation(_) | A2AError::Serialization(_) => -32602,
            _ => -32603,
        }
    }
}

/// Result type alias for A2A operations
pub type A2AResult<T> = Result<T, A2AError>;

impl From<reqwest::Error> for A2AError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            A2AError::Timeout
        } else if err.is_connect() {
            A2AError::Transport(format!("Connection error: {}", err))
        } else {
            A2AError::Transport(err.to_string())
        }
    }
}

impl From<&str> for A2AError {
    fn from(s: &str) -> Self {
        A2AError::Other(s.to_string())
    }
}

impl From<String> for A2AError {
    fn from(s: String) -> Self {
        A2AError::Other(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = A2AError::TaskNotCancelable {
            task_id: "task-1".into(),
            state: TaskState::Completed,
        };
        assert_eq!(
            err.to_string(),
            "Task task-1 cannot be canceled in state completed"
        );

        let err = A2AError::RemoteTask {
            state: TaskState::Failed,
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "Remote task failed: boom");
    }

    #[test]
    fn test_jsonrpc_codes() {
        assert_eq!(
            A2AError::TaskNotFound {
                task_id: "x".into()
            }
            .jsonrpc_code(),
            -32001
        );
        assert_eq!(A2AError::Validation("bad".into()).jsonrpc_code(), -32602);
        assert_eq!(A2AError::Other("x".into()).jsonrpc_code(), -32603);
    }
}
