//! A2A service response types

use std::fmt;

use futures::stream::BoxStream;

use crate::protocol::{
    agent::AgentCard, error::A2AError, event::StreamEvent, message::Message, task::Task,
};

/// Ordered stream of decoded task events
pub type EventStream = BoxStream<'static, Result<StreamEvent, A2AError>>;

/// Response from an A2A service operation
pub enum A2AResponse {
    /// Task response (from SendMessage, GetTask, CancelTask)
    Task(Box<Task>),

    /// Direct message reply (from a non-streaming SendMessage)
    Message(Box<Message>),

    /// Agent card response (from discovery)
    AgentCard(Box<AgentCard>),

    /// Event stream (from a streaming SendMessage)
    Stream(EventStream),

    /// Empty response (for operations with no return value)
    Empty,
}

impl A2AResponse {
    /// Extract a task from the response, if present
    pub fn into_task(self) -> Option<Task> {
        match self {
            A2AResponse::Task(task) => Some(*task),
            _ => None,
        }
    }

    /// Extract an agent card from the response, if present
    pub fn into_agent_card(self) -> Option<AgentCard> {
        match self {
            A2AResponse::AgentCard(card) => Some(*card),
            _ => None,
        }
    }

    /// Extract an event stream from the response, if present
    pub fn into_stream(self) -> Option<EventStream> {
        match self {
            A2AResponse::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    /// Check if the response is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, A2AResponse::Empty)
    }
}

impl fmt::Debug for A2AResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            A2AResponse::Task(task) => f.debug_tuple("Task").field(task).finish(),
            A2AResponse::Message(message) => f.debug_tuple("Message").field(message).finish(),
            A2AResponse::AgentCard(card) => f.debug_tuple("AgentCard").field(card).finish(),
            A2AResponse::Stream(_) => f.write_str("Stream(..)"),
            A2AResponse::Empty => f.write_str("Empty"),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use crate::protocol::message::Message;

    use super::*;

    #[test]
    fn test_response_task() {
        let task = Task::new("task-123", "ctx", Message::user("Test"));
        let response = A2AResponse::Task(Box::new(task));

        assert!(matches!(response, A2AResponse::Task(_)));

        let extracted = response.into_task();
        assert_eq!(extracted.unwrap().id, "task-123");
    }

    #[tokio::test]
    async fn test_response_stream() {
        let task = Task::new("task-1", "ctx", Message::user("Test"));
        let stream = futures::stream::iter(vec![Ok(StreamEvent::Task(task))]).boxed();
        let response = A2AResponse::Stream(stream);

        assert_eq!(format!("{:?}", response), "Stream(..)");

        let mut stream = response.into_stream().unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.task_id(), Some("task-1"));
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_response_empty() {
        let response = A2AResponse::Empty;
        assert!(response.is_empty());
        assert!(response.into_stream().is_none());
    }
}
