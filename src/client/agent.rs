//! High-level A2A agent client

use tower::ServiceExt;
use tower_service::Service;

use crate::{
    client::{config::ClientConfig, consumer::StreamConsumer},
    protocol::{error::A2AError, A2AOperation, AgentCard, Message, Task},
    service::{response::EventStream, A2ARequest, A2AResponse, RequestContext},
};

/// High-level A2A client for interacting with agents
///
/// This client wraps a Tower service and provides convenient methods for the A2A
/// operations. The service is generic over any implementation that satisfies the
/// Service trait bounds; clients built by `A2AClientBuilder` use the type-erased
/// `A2AService` and are cheap to clone.
///
/// # Example
///
/// ```rust,no_run
/// use tower_a2a_dispatch::prelude::*;
///
/// # async fn example() -> Result<(), A2AError> {
/// let url = "http://localhost:9999".parse().unwrap();
/// let mut client = A2AClientBuilder::new_http(url).build()?;
///
/// let mut chunks = client.stream_chunks(Message::user("Hello, agent!")).await?;
/// while let Some(chunk) = chunks.next_chunk().await {
///     println!("{}", chunk?.text);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AgentClient<S> {
    service: S,
    config: ClientConfig,
}

impl<S> AgentClient<S>
where
    S: Service<A2ARequest, Response = A2AResponse, Error = A2AError>,
{
    /// Create a new agent client
    ///
    /// # Arguments
    ///
    /// * `service` - The Tower service that handles requests
    /// * `config` - Client configuration
    pub fn new(service: S, config: ClientConfig) -> Self {
        Self { service, config }
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build a request context from the client configuration
    fn build_context(&self) -> RequestContext {
        RequestContext::new(self.config.agent_url.clone())
    }

    async fn execute(&mut self, operation: A2AOperation) -> Result<A2AResponse, A2AError> {
        let request = A2ARequest::new(operation, self.build_context());
        self.service.ready().await?.call(request).await
    }

    /// Send a message and wait for the resulting task
    ///
    /// # Errors
    ///
    /// Returns an error if the message fails to send or the agent answers with
    /// something other than a task.
    pub async fn send_message(&mut self, message: Message) -> Result<Task, A2AError> {
        let response = self
            .execute(A2AOperation::SendMessage {
                message,
                stream: false,
            })
            .await?;

        match response {
            A2AResponse::Task(task) => Ok(*task),
            _ => Err(A2AError::Protocol(
                "Expected task response from send_message".into(),
            )),
        }
    }

    /// Send a message and receive the raw event stream
    pub async fn send_message_stream(&mut self, message: Message) -> Result<EventStream, A2AError> {
        let response = self
            .execute(A2AOperation::SendMessage {
                message,
                stream: true,
            })
            .await?;

        response.into_stream().ok_or_else(|| {
            A2AError::Protocol("Expected event stream from send_message_stream".into())
        })
    }

    /// Send a message and consume the result as text chunks
    pub async fn stream_chunks(&mut self, message: Message) -> Result<StreamConsumer, A2AError> {
        let events = self.send_message_stream(message).await?;
        Ok(StreamConsumer::new(events).with_idle_timeout(self.config.read_timeout))
    }

    /// Get a task by ID
    ///
    /// # Errors
    ///
    /// Returns `A2AError::TaskNotFound` if the task doesn't exist
    pub async fn get_task(&mut self, task_id: impl Into<String>) -> Result<Task, A2AError> {
        let response = self
            .execute(A2AOperation::GetTask {
                task_id: task_id.into(),
            })
            .await?;

        response
            .into_task()
            .ok_or_else(|| A2AError::Protocol("Expected task response from get_task".into()))
    }

    /// Cancel a task by ID
    ///
    /// # Returns
    ///
    /// The updated task in the `canceled` state
    pub async fn cancel_task(&mut self, task_id: impl Into<String>) -> Result<Task, A2AError> {
        let response = self
            .execute(A2AOperation::CancelTask {
                task_id: task_id.into(),
            })
            .await?;

        response
            .into_task()
            .ok_or_else(|| A2AError::Protocol("Expected task response from cancel_task".into()))
    }

    /// Discover agent capabilities by fetching the public Agent Card
    ///
    /// This retrieves the agent's metadata from `/.well-known/agent-card.json`
    pub async fn discover(&mut self) -> Result<AgentCard, A2AError> {
        let response = self.execute(A2AOperation::DiscoverAgent).await?;

        response.into_agent_card().ok_or_else(|| {
            A2AError::Protocol("Expected agent card response from discover".into())
        })
    }

    /// Fetch the authenticated extended Agent Card
    ///
    /// Credentials come from the client's auth layer.
    pub async fn discover_extended(&mut self) -> Result<AgentCard, A2AError> {
        let path = self.config.extended_card_path.clone();
        let response = self
            .execute(A2AOperation::DiscoverExtendedAgent { path })
            .await?;

        response.into_agent_card().ok_or_else(|| {
            A2AError::Protocol("Expected agent card response from discover_extended".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        client::A2AClientBuilder,
        codec::{JsonCodec, JsonRpcCodec, JsonRpcResponse},
        protocol::{agent::AgentCard, message::Message},
        service::A2AProtocolService,
        transport::{mock::MockTransport, TransportResponse},
    };
    use bytes::Bytes;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_send_message() {
        let transport = MockTransport::new(|_req| {
            let task = Task::new("task-123", "ctx", Message::user("Test"));
            let json = serde_json::to_vec(&task).unwrap();
            TransportResponse::new(200).body(Bytes::from(json))
        });

        let codec = Arc::new(JsonCodec::new());
        let service = A2AProtocolService::new(transport, codec);
        let config = ClientConfig::new("https://example.com");
        let mut client = AgentClient::new(service, config);

        let task = client.send_message(Message::user("Hello")).await.unwrap();

        assert_eq!(task.id, "task-123");
    }

    #[tokio::test]
    async fn test_get_task_over_jsonrpc() {
        let transport = MockTransport::new(|req| {
            let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
            assert_eq!(body["method"], "tasks/get");
            assert_eq!(body["params"]["id"], "task-456");

            let task = Task::new("task-456", "ctx", Message::user("Test"));
            let reply = JsonRpcResponse::success(body["id"].clone(), serde_json::to_value(task).unwrap());
            TransportResponse::new(200).body(Bytes::from(serde_json::to_vec(&reply).unwrap()))
        });

        let service = A2AProtocolService::new(transport, Arc::new(JsonRpcCodec::new()));
        let mut client = AgentClient::new(service, ClientConfig::new("https://example.com"));

        let task = client.get_task("task-456").await.unwrap();

        assert_eq!(task.id, "task-456");
    }

    #[tokio::test]
    async fn test_discover_extended_sends_bearer() {
        let transport = MockTransport::new(|req| {
            let card = if req.endpoint == "/agent/authenticatedExtendedCard" {
                assert_eq!(req.bearer_token(), Some("secret"));
                AgentCard::new("Private", "full skills", "https://example.com/")
            } else {
                AgentCard::new("Public", "basic", "https://example.com/")
            };
            TransportResponse::new(200).body(Bytes::from(serde_json::to_vec(&card).unwrap()))
        });

        let mut client = A2AClientBuilder::new("https://example.com".parse().unwrap())
            .with_transport(transport.clone())
            .with_bearer_auth("secret")
            .build()
            .unwrap();

        assert_eq!(client.discover().await.unwrap().name, "Public");
        assert_eq!(client.discover_extended().await.unwrap().name, "Private");
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_stream_requires_stream_response() {
        let transport = MockTransport::ok().with_stream(|_req| {
            vec![format!(
                "data: {}\n\n",
                json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32602, "message": "bad params"}})
            )]
        });

        let mut client = A2AClientBuilder::new("https://example.com".parse().unwrap())
            .with_transport(transport)
            .build()
            .unwrap();

        let mut chunks = client.stream_chunks(Message::user("hi")).await.unwrap();
        match chunks.next_chunk().await {
            Some(Err(A2AError::Validation(msg))) => assert!(msg.contains("bad params")),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }
}
