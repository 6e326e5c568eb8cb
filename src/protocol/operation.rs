//! A2A protocol operations

use super::message::Message;

/// Path of the public agent card
pub const AGENT_CARD_PATH: &str = "/.well-known/agent-card.json";

/// Default path of the authenticated extended agent card
pub const EXTENDED_AGENT_CARD_PATH: &str = "/agent/authenticatedExtendedCard";

/// A2A protocol operations
///
/// Each operation is binding-independent; codecs decide how it travels on the wire.
#[derive(Debug, Clone)]
pub enum A2AOperation {
    /// Send a message to an agent
    SendMessage {
        /// The message to send
        message: Message,

        /// Whether to stream the response as events
        stream: bool,
    },

    /// Get a task by ID
    GetTask {
        /// The task ID to retrieve
        task_id: String,
    },

    /// Cancel a task
    CancelTask {
        /// The task ID to cancel
        task_id: String,
    },

    /// Fetch the public Agent Card
    DiscoverAgent,

    /// Fetch the authenticated extended Agent Card
    DiscoverExtendedAgent {
        /// Path the card is served from
        path: String,
    },
}

impl A2AOperation {
    /// Get the HTTP endpoint path for this operation (HTTP+JSON binding)
    pub fn endpoint(&self) -> String {
        match self {
            A2AOperation::SendMessage { stream: false, .. } => "/v1/message:send".to_string(),
            A2AOperation::SendMessage { stream: true, .. } => "/v1/message:stream".to_string(),
            A2AOperation::GetTask { task_id } => format!("/v1/tasks/{}", task_id),
            A2AOperation::CancelTask { task_id } => format!("/v1/tasks/{}:cancel", task_id),
            A2AOperation::DiscoverAgent => AGENT_CARD_PATH.to_string(),
            A2AOperation::DiscoverExtendedAgent { path } => path.clone(),
        }
    }

    /// Get the HTTP method for this operation
    pub fn method(&self) -> &'static str {
        match self {
            A2AOperation::SendMessage { .. } => "POST",
            A2AOperation::GetTask { .. } => "GET",
            A2AOperation::CancelTask { .. } => "POST",
            A2AOperation::DiscoverAgent => "GET",
            A2AOperation::DiscoverExtendedAgent { .. } => "GET",
        }
    }

    /// Check if this operation expects a streaming response
    pub fn is_streaming(&self) -> bool {
        matches!(self, A2AOperation::SendMessage { stream: true, .. })
    }

    /// Card lookups bypass the RPC envelope in every binding
    pub fn is_discovery(&self) -> bool {
        matches!(
            self,
            A2AOperation::DiscoverAgent | A2AOperation::DiscoverExtendedAgent { .. }
        )
    }
}
