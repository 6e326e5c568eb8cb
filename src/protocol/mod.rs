//! Core A2A protocol types and definitions

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod agent;
pub mod error;
pub mod event;
pub mod hitl;
pub mod message;
pub mod operation;
pub mod task;

pub use agent::{AgentCapabilities, AgentCard, AgentSkill};
pub use error::{A2AError, A2AResult};
pub use event::{StreamEvent, TaskArtifactUpdateEvent, TaskStatusUpdateEvent};
pub use hitl::{ActionRequest, Decision, HitlRequest, InputEnvelope, ResumeCommand};
pub use message::{FileContent, Message, Part, Role};
pub use operation::A2AOperation;
pub use task::{Task, TaskState, TaskStatus};

/// Artifacts represent task outputs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Unique identifier of the Artifact
    pub artifact_id: String,

    /// A human readable name for the Artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// A human readable description of the Artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Contents of the Artifact. Must contain at least one part
    pub parts: Vec<Part>,
}

impl Artifact {
    /// Create a named artifact with a fresh id
    pub fn new(name: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            artifact_id: Uuid::now_v7().to_string(),
            name: Some(name.into()),
            description: None,
            parts,
        }
    }
}
