//! A2A task types and lifecycle management

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{error::A2AError, message::Message, Artifact};

/// A task in the A2A protocol
///
/// Tasks represent asynchronous work performed by an agent for one incoming message.
/// They move from `submitted` through `working` to a terminal state, optionally pausing
/// in `input-required` while an external decision is pending.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier for the task
    pub id: String,

    /// Conversation this task belongs to
    pub context_id: String,

    /// Current status of the task
    pub status: TaskStatus,

    /// Messages exchanged for this task, starting with the originating message
    #[serde(default)]
    pub history: Vec<Message>,

    /// Outputs produced so far
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
}

impl Task {
    /// Create a new task in the `submitted` state
    pub fn new(id: impl Into<String>, context_id: impl Into<String>, message: Message) -> Self {
        Self {
            id: id.into(),
            context_id: context_id.into(),
            status: TaskStatus::new(TaskState::Submitted),
            history: vec![message],
            artifacts: Vec::new(),
        }
    }

    /// The message that created this task
    pub fn originating_message(&self) -> Option<&Message> {
        self.history.first()
    }

    /// Check if the task is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.state.is_terminal()
    }

    /// Check if the task is paused waiting for input
    pub fn requires_input(&self) -> bool {
        self.status.state == TaskState::InputRequired
    }

    /// Move the task to a new status
    ///
    /// # Errors
    ///
    /// Returns `A2AError::Protocol` when the transition is not allowed by the lifecycle,
    /// or when a state that must explain itself has no text message.
    pub fn transition(&mut self, status: TaskStatus) -> Result<(), A2AError> {
        if !self.status.state.can_transition_to(status.state) {
            return Err(A2AError::Protocol(format!(
                "Invalid transition for task {}: {} -> {}",
                self.id, self.status.state, status.state
            )));
        }

        if status.state.requires_message()
            && !status.message.as_ref().is_some_and(Message::has_text)
        {
            return Err(A2AError::Protocol(format!(
                "Status {} for task {} must carry a text message",
                status.state, self.id
            )));
        }

        self.status = status;
        Ok(())
    }
}

/// Status of a task at a point in time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStatus {
    /// Lifecycle state
    pub state: TaskState,

    /// Message explaining the state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,

    /// When the status was recorded
    pub timestamp: DateTime<Utc>,
}

impl TaskStatus {
    /// Create a status without a message
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            message: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach an explaining message
    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message);
        self
    }
}

/// Task lifecycle state
///
/// Lifecycle: submitted → working → {input-required} → completed | failed | canceled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    /// Task has been received
    Submitted,

    /// Task is being processed
    Working,

    /// Task is paused until the client supplies a decision
    InputRequired,

    /// Task completed successfully
    Completed,

    /// Task failed
    Failed,

    /// Task was canceled
    Canceled,
}

impl TaskState {
    /// Completed, failed or canceled
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled
        )
    }

    /// States that close the event stream with `final = true`
    pub fn is_final(&self) -> bool {
        self.is_terminal() || *self == TaskState::InputRequired
    }

    /// States whose status must carry a text message
    pub fn requires_message(&self) -> bool {
        self.is_final()
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;

        match self {
            Submitted => matches!(next, Working | Failed | Canceled),
            Working => matches!(next, Working | InputRequired | Completed | Failed | Canceled),
            InputRequired => matches!(next, Working | Failed | Canceled),
            Completed | Failed | Canceled => false,
        }
    }

    /// Wire name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Submitted => "submitted",
            TaskState::Working => "working",
            TaskState::InputRequired => "input-required",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Canceled => "canceled",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
