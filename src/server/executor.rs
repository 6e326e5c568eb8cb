//! Agent executor trait, the business logic behind a task

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    protocol::{
        error::A2AResult,
        hitl::InputEnvelope,
        message::{Message, Part},
        task::Task,
    },
    server::updater::TaskUpdater,
};

/// What an executor sees for one incoming message
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Task snapshot at the start of execution, already in the `working` state
    pub task: Task,

    /// The message that triggered this execution
    pub message: Message,

    /// True when the message resumes a task paused in `input-required`
    pub resumed: bool,
}

impl ExecutionContext {
    pub fn task_id(&self) -> &str {
        &self.task.id
    }

    pub fn context_id(&self) -> &str {
        &self.task.context_id
    }

    /// Text parts of the incoming message joined by newlines
    pub fn user_text(&self) -> String {
        self.message.text()
    }

    /// Protocol envelope carried in a data part, if any
    ///
    /// A data part tagged as an envelope but malformed is a `Validation` error.
    pub fn envelope(&self) -> A2AResult<Option<InputEnvelope>> {
        for data in self.message.parts.iter().filter_map(Part::as_data) {
            if let Some(envelope) = InputEnvelope::from_value(data)? {
                return Ok(Some(envelope));
            }
        }
        Ok(None)
    }

    /// Structured business payload
    ///
    /// Unwraps an `input_user` envelope; otherwise the first data part that is not an
    /// envelope. Resume commands are not payloads.
    pub fn payload(&self) -> A2AResult<Option<Value>> {
        Ok(match self.envelope()? {
            Some(InputEnvelope::InputUser(data)) => Some(data),
            Some(InputEnvelope::Command(_)) => None,
            None => self
                .message
                .parts
                .iter()
                .filter_map(Part::as_data)
                .next()
                .cloned(),
        })
    }
}

/// Business logic run for each task
///
/// The executor reports progress through the updater and must finish with a final
/// status (`completed`, `failed`, `canceled` or `input-required`). Returning an error
/// or panicking is turned into a `failed` final by the request handler:
/// `A2AError::Validation` messages are shown to the caller as-is, anything else as an
/// internal error.
#[async_trait]
pub trait AgentExecutor: Send + Sync + 'static {
    async fn execute(&self, context: ExecutionContext, updater: TaskUpdater) -> A2AResult<()>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::protocol::{
        error::A2AError,
        hitl::{Decision, ResumeCommand},
        message::Role,
    };

    use super::*;

    fn context(message: Message) -> ExecutionContext {
        ExecutionContext {
            task: Task::new("t1", "c1", message.clone()),
            message,
            resumed: false,
        }
    }

    #[test]
    fn test_plain_payload() {
        let message = Message::new(
            Role::User,
            vec![
                Part::text("Convert currency"),
                Part::data(json!({"amount": 100, "from": "USD", "to": "VND"})),
            ],
        );
        let ctx = context(message);

        assert_eq!(ctx.user_text(), "Convert currency");
        assert!(ctx.envelope().unwrap().is_none());
        assert_eq!(ctx.payload().unwrap().unwrap()["amount"], 100);
    }

    #[test]
    fn test_input_user_envelope() {
        let envelope = InputEnvelope::InputUser(json!({"amount": 5}));
        let ctx = context(Message::new(Role::User, vec![Part::data(envelope.to_value())]));

        assert_eq!(ctx.payload().unwrap(), Some(json!({"amount": 5})));
    }

    #[test]
    fn test_command_is_not_a_payload() {
        let message = ResumeCommand::new(vec![Decision::Approve]).into_message("c1");
        let ctx = context(message);

        assert!(matches!(ctx.envelope(), Ok(Some(InputEnvelope::Command(_)))));
        assert_eq!(ctx.payload().unwrap(), None);
    }

    #[test]
    fn test_malformed_envelope_is_a_validation_error() {
        let bad = json!({"type": "command", "data": {"decisions": [{"type": "approved"}]}});
        let ctx = context(Message::new(Role::User, vec![Part::data(bad)]));

        assert!(matches!(ctx.envelope(), Err(A2AError::Validation(_))));
        assert!(matches!(ctx.payload(), Err(A2AError::Validation(_))));
    }
}
