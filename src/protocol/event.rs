//! Streaming event envelopes
//!
//! A task's event stream is a totally ordered sequence of [`StreamEvent`] values:
//! one `task` snapshot first, then progress updates, then exactly one event
//! carrying `final = true`.

use serde::{Deserialize, Serialize};

use super::{
    message::Message,
    task::{Task, TaskState, TaskStatus},
    Artifact,
};

/// One event in a task's stream, tagged on the wire by `kind`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum StreamEvent {
    /// Snapshot of the task, always the first event
    #[serde(rename = "task")]
    Task(Task),

    /// Change of the task status
    #[serde(rename = "status-update")]
    StatusUpdate(TaskStatusUpdateEvent),

    /// Named output fragment
    #[serde(rename = "artifact-update")]
    ArtifactUpdate(TaskArtifactUpdateEvent),

    /// Bare agent message for ephemeral updates
    #[serde(rename = "message")]
    Message(Message),
}

impl StreamEvent {
    /// Whether this event closes the stream
    pub fn is_final(&self) -> bool {
        matches!(self, StreamEvent::StatusUpdate(update) if update.is_final)
    }

    /// Task id carried by the event, if any
    pub fn task_id(&self) -> Option<&str> {
        match self {
            StreamEvent::Task(task) => Some(&task.id),
            StreamEvent::StatusUpdate(update) => Some(&update.task_id),
            StreamEvent::ArtifactUpdate(update) => Some(&update.task_id),
            StreamEvent::Message(message) => message.task_id.as_deref(),
        }
    }

    /// Context id carried by the event, if any
    pub fn context_id(&self) -> Option<&str> {
        match self {
            StreamEvent::Task(task) => Some(&task.context_id),
            StreamEvent::StatusUpdate(update) => Some(&update.context_id),
            StreamEvent::ArtifactUpdate(update) => Some(&update.context_id),
            StreamEvent::Message(message) => message.context_id.as_deref(),
        }
    }

    /// Task state carried by the event, if any
    pub fn state(&self) -> Option<TaskState> {
        match self {
            StreamEvent::Task(task) => Some(task.status.state),
            StreamEvent::StatusUpdate(update) => Some(update.status.state),
            _ => None,
        }
    }

    /// Wire `kind` of the event
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Task(_) => "task",
            StreamEvent::StatusUpdate(_) => "status-update",
            StreamEvent::ArtifactUpdate(_) => "artifact-update",
            StreamEvent::Message(_) => "message",
        }
    }
}

/// Status change of a task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusUpdateEvent {
    pub task_id: String,
    pub context_id: String,
    pub status: TaskStatus,

    /// Marks the last event of the stream
    #[serde(rename = "final", default)]
    pub is_final: bool,
}

/// Artifact produced by a task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskArtifactUpdateEvent {
    pub task_id: String,
    pub context_id: String,
    pub artifact: Artifact,

    /// Append to a previously sent artifact with the same id
    #[serde(default)]
    pub append: bool,

    #[serde(default)]
    pub last_chunk: bool,
}
