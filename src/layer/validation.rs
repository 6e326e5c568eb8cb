//! Protocol checks around the client service
//!
//! Requests and unary responses are checked up front. Event streams are wrapped in a
//! guard that enforces the stream ordering contract: the first event is a task
//! snapshot and nothing follows the final event. Events after the final one are
//! dropped and logged rather than surfaced as errors.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures::StreamExt;
use tower_layer::Layer;
use tower_service::Service;

use crate::{
    protocol::{error::A2AError, event::StreamEvent, message::Part, operation::A2AOperation},
    service::{response::EventStream, A2ARequest, A2AResponse},
};

/// Rejects malformed requests before they leave the process
#[derive(Clone, Debug, Default)]
pub struct A2AValidationLayer;

impl A2AValidationLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for A2AValidationLayer {
    type Service = A2AValidationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        A2AValidationService { inner }
    }
}

#[derive(Clone)]
pub struct A2AValidationService<S> {
    inner: S,
}

impl<S> A2AValidationService<S> {
    fn validate_request(req: &A2ARequest) -> Result<(), A2AError> {
        match &req.operation {
            A2AOperation::SendMessage { message, .. } => {
                if message.message_id.is_empty() {
                    return Err(A2AError::Validation("Message ID cannot be empty".into()));
                }

                if message.parts.is_empty() {
                    return Err(A2AError::Validation(
                        "Message must have at least one part".into(),
                    ));
                }

                for part in &message.parts {
                    if let Part::File { file } = part {
                        if file.uri.is_none() && file.bytes.is_none() {
                            return Err(A2AError::Validation(
                                "File must have either URI or bytes content".into(),
                            ));
                        }
                    }
                }
            }
            A2AOperation::GetTask { task_id } | A2AOperation::CancelTask { task_id } => {
                if task_id.is_empty() {
                    return Err(A2AError::Validation("Task ID cannot be empty".into()));
                }
            }
            A2AOperation::DiscoverAgent | A2AOperation::DiscoverExtendedAgent { .. } => {}
        }

        if req.context.agent_url.is_empty() {
            return Err(A2AError::Validation("Agent URL cannot be empty".into()));
        }

        Ok(())
    }

    /// Unary responses only; streams go through `guard_stream`
    fn validate_response(resp: &A2AResponse) -> Result<(), A2AError> {
        match resp {
            A2AResponse::Task(task) => {
                if task.id.is_empty() {
                    return Err(A2AError::Validation("Task ID cannot be empty".into()));
                }
            }
            A2AResponse::AgentCard(card) => {
                if card.name.is_empty() {
                    return Err(A2AError::Validation("Agent name cannot be empty".into()));
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Drop anything after the final event
    fn guard_stream(events: EventStream) -> EventStream {
        let mut position = 0usize;
        let mut finished = false;

        events
            .filter_map(move |item| {
                let index = position;
                position += 1;

                let out = match item {
                    Err(e) => Some(Err(e)),
                    Ok(_) if finished => {
                        tracing::warn!("dropping event received after the final event");
                        None
                    }
                    Ok(event) => {
                        if index == 0 && !matches!(event, StreamEvent::Task(_)) {
                            tracing::debug!(kind = event.kind(), "stream did not open with a task snapshot");
                        }
                        if let StreamEvent::StatusUpdate(update) = &event {
                            let has_text = update
                                .status
                                .message
                                .as_ref()
                                .is_some_and(|m| m.has_text());
                            if update.is_final && !has_text {
                                tracing::warn!(
                                    task_id = %update.task_id,
                                    state = %update.status.state,
                                    "final event without a status message"
                                );
                            }
                        }
                        finished = event.is_final();
                        Some(Ok(event))
                    }
                };
                futures::future::ready(out)
            })
            .boxed()
    }
}

impl<S> Service<A2ARequest> for A2AValidationService<S>
where
    S: Service<A2ARequest, Response = A2AResponse, Error = A2AError> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = A2AResponse;
    type Error = A2AError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: A2ARequest) -> Self::Future {
        if let Err(e) = Self::validate_request(&req) {
            return Box::pin(async move { Err(e) });
        }

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move {
            let response = inner.call(req).await?;

            match response {
                A2AResponse::Stream(events) => Ok(A2AResponse::Stream(Self::guard_stream(events))),
                response => {
                    Self::validate_response(&response)?;
                    Ok(response)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        protocol::{
            event::TaskStatusUpdateEvent,
            message::{FileContent, Message, Role},
            task::{Task, TaskState, TaskStatus},
        },
        service::RequestContext,
    };

    use super::*;

    fn status(state: TaskState, is_final: bool) -> StreamEvent {
        StreamEvent::StatusUpdate(TaskStatusUpdateEvent {
            task_id: "t".into(),
            context_id: "c".into(),
            status: TaskStatus::new(state).with_message(Message::agent(state.as_str())),
            is_final,
        })
    }

    #[test]
    fn test_validate_send_message() {
        let operation = A2AOperation::SendMessage {
            message: Message::user("Hello"),
            stream: false,
        };

        let context = RequestContext::new("https://example.com");
        let request = A2ARequest::new(operation, context);

        assert!(A2AValidationService::<()>::validate_request(&request).is_ok());
    }

    #[test]
    fn test_validate_empty_message() {
        let mut message = Message::user("Test");
        message.parts.clear();

        let operation = A2AOperation::SendMessage {
            message,
            stream: false,
        };

        let context = RequestContext::new("https://example.com");
        let request = A2ARequest::new(operation, context);

        assert!(A2AValidationService::<()>::validate_request(&request).is_err());
    }

    #[test]
    fn test_validate_file_by_uri() {
        let message = Message::new(
            Role::User,
            vec![Part::text("Summarize"), Part::file_uri("report.pdf", "https://files.local/report.pdf")],
        );
        let request = A2ARequest::new(
            A2AOperation::SendMessage {
                message,
                stream: true,
            },
            RequestContext::new("http://files.local/"),
        );

        assert!(A2AValidationService::<()>::validate_request(&request).is_ok());
    }

    #[test]
    fn test_validate_file_part_needs_content() {
        let message = Message::new(
            Role::User,
            vec![
                Part::text("Summarize"),
                Part::File {
                    file: FileContent::default(),
                },
            ],
        );
        let request = A2ARequest::new(
            A2AOperation::SendMessage {
                message,
                stream: true,
            },
            RequestContext::new("http://files.local/"),
        );

        assert!(matches!(
            A2AValidationService::<()>::validate_request(&request),
            Err(A2AError::Validation(m)) if m.contains("URI or bytes")
        ));
    }

    #[test]
    fn test_validate_task_response() {
        let task = Task::new("task-123", "ctx", Message::user("Test"));
        let response = A2AResponse::Task(Box::new(task));

        assert!(A2AValidationService::<()>::validate_response(&response).is_ok());
    }

    #[tokio::test]
    async fn test_guard_drops_events_after_final() {
        let events = futures::stream::iter(vec![
            Ok(StreamEvent::Task(Task::new("t", "c", Message::user("x")))),
            Ok(status(TaskState::Completed, true)),
            Ok(status(TaskState::Working, false)),
        ])
        .boxed();

        let seen: Vec<_> = A2AValidationService::<()>::guard_stream(events)
            .collect()
            .await;

        assert_eq!(seen.len(), 2);
        assert!(seen[1].as_ref().unwrap().is_final());
    }
}
