//! A2A message types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A message in the A2A protocol
///
/// Messages are the primary unit of communication between agents.
/// Each message has a role (user or agent), one or more ordered parts (text, file, or data)
/// and the identifiers that correlate it with a conversation and a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique identifier of this message
    pub message_id: String,

    /// Role of the message sender
    pub role: Role,

    /// Message content parts (at least one required, order is significant)
    pub parts: Vec<Part>,

    /// Conversation correlation key, stable across interrupt/resume rounds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,

    /// Task this message belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    /// Optional metadata for the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl Message {
    /// Create a new message from a list of parts
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            message_id: Uuid::now_v7().to_string(),
            role,
            parts,
            context_id: None,
            task_id: None,
            metadata: None,
        }
    }

    /// Create a user message with text content
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    /// Create an agent message with text content
    pub fn agent(text: impl Into<String>) -> Self {
        Self::new(Role::Agent, vec![Part::text(text)])
    }

    /// Create a new message builder
    pub fn builder() -> MessageBuilder {
        MessageBuilder::new()
    }

    /// Set the context ID
    pub fn with_context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    /// Set the task ID
    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Add a message part
    pub fn with_part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Iterate over the text parts, in order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(Part::as_text)
    }

    /// All text parts joined with newlines
    pub fn text(&self) -> String {
        self.texts().collect::<Vec<_>>().join("\n")
    }

    /// The first structured data part, if any
    pub fn first_data(&self) -> Option<&Value> {
        self.parts.iter().find_map(Part::as_data)
    }

    /// True when at least one text part has non-whitespace content
    pub fn has_text(&self) -> bool {
        self.texts().any(|t| !t.trim().is_empty())
    }
}

/// Builder for constructing Message instances
#[derive(Debug, Default)]
pub struct MessageBuilder {
    role: Option<Role>,
    parts: Vec<Part>,
    message_id: Option<String>,
    task_id: Option<String>,
    context_id: Option<String>,
}

impl MessageBuilder {
    /// Create a new message builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the role of the message
    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Set the message parts
    pub fn parts(mut self, parts: Vec<Part>) -> Self {
        self.parts = parts;
        self
    }

    /// Add a single part to the message
    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Set the message ID
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Set the task ID
    pub fn task_id(mut self, id: impl Into<String>) -> Self {
        self.task_id = Some(id.into());
        self
    }

    /// Set the context ID
    pub fn context_id(mut self, id: impl Into<String>) -> Self {
        self.context_id = Some(id.into());
        self
    }

    /// Build the message
    ///
    /// A message ID is generated when none was set.
    ///
    /// # Panics
    ///
    /// Panics if role is not set or if parts are empty
    pub fn build(self) -> Message {
        let role = self.role.expect("Message role is required");
        assert!(
            !self.parts.is_empty(),
            "Message must have at least one part"
        );

        Message {
            message_id: self
                .message_id
                .unwrap_or_else(|| Uuid::now_v7().to_string()),
            role,
            parts: self.parts,
            context_id: self.context_id,
            task_id: self.task_id,
            metadata: None,
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message from a user (or a calling agent)
    User,

    /// Message from the remote agent
    Agent,
}

/// File content for file parts
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    /// Name of the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// MIME type of the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Base64-encoded file content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<String>,

    /// URI reference to the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// A part of a message, tagged on the wire by `kind`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    /// Text content
    Text {
        /// The text content
        text: String,
    },

    /// Structured data, used for business payloads and protocol envelopes
    Data {
        /// The structured data
        data: Value,
    },

    /// File content
    File {
        /// The file payload
        file: FileContent,
    },
}

impl Part {
    /// Create a text part
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a data part
    pub fn data(data: Value) -> Self {
        Self::Data { data }
    }

    /// Create a file part with base64-encoded bytes
    pub fn file_bytes(
        name: impl Into<String>,
        bytes_base64: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self::File {
            file: FileContent {
                name: Some(name.into()),
                mime_type: Some(mime_type.into()),
                bytes: Some(bytes_base64.into()),
                uri: None,
            },
        }
    }

    /// Create a file part with a URI reference
    pub fn file_uri(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self::File {
            file: FileContent {
                name: Some(name.into()),
                mime_type: None,
                bytes: None,
                uri: Some(uri.into()),
            },
        }
    }

    /// The text content, if this is a text part
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            _ => None,
        }
    }

    /// The data value, if this is a data part
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Part::Data { data } => Some(data),
            _ => None,
        }
    }
}
