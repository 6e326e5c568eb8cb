//! Human-in-the-loop interrupt and resume payloads
//!
//! An interrupted task ends its stream with `input-required` and a text part holding a
//! serialized [`HitlRequest`]. The caller answers with a new message in the same
//! context whose data part is an [`InputEnvelope::Command`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{
    error::A2AError,
    message::{Message, Part, Role},
};

/// A pending tool call awaiting a decision
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionRequest {
    /// Tool name
    pub name: String,

    /// Tool arguments
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ActionRequest {
    pub fn new(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Interrupt payload carried by an `input-required` status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HitlRequest {
    pub action_requests: Vec<ActionRequest>,
}

impl HitlRequest {
    /// Serialize for a status message text part
    pub fn to_text(&self) -> Result<String, A2AError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the text of an `input-required` status
    pub fn from_text(text: &str) -> Result<Self, A2AError> {
        serde_json::from_str(text).map_err(|e| {
            A2AError::Protocol(format!("input-required message is not an interrupt request: {}", e))
        })
    }
}

/// Decision for one action request, matched by position
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Decision {
    /// Run the action unchanged
    Approve,

    /// Skip the action and feed the reason back
    Reject { message: String },

    /// Run the action with substituted arguments
    Edit { edited_action: ActionRequest },
}

/// Resume payload: one decision per pending action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResumeCommand {
    pub decisions: Vec<Decision>,
}

impl ResumeCommand {
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self { decisions }
    }

    /// Check that the decisions match the pending actions one to one
    pub fn validate_against(&self, request: &HitlRequest) -> Result<(), A2AError> {
        if self.decisions.len() != request.action_requests.len() {
            return Err(A2AError::Validation(format!(
                "Expected {} decisions, got {}",
                request.action_requests.len(),
                self.decisions.len()
            )));
        }
        Ok(())
    }

    /// Build the resume message for an interrupted context
    pub fn into_message(self, context_id: impl Into<String>) -> Message {
        Message::new(Role::User, vec![Part::data(InputEnvelope::Command(self).to_value())])
            .with_context_id(context_id)
    }
}

/// Protocol envelope carried in a data part
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum InputEnvelope {
    /// Fresh user payload
    InputUser(Value),

    /// Decisions resuming an interrupted task
    Command(ResumeCommand),
}

impl InputEnvelope {
    /// Recognise an envelope inside a data part value
    ///
    /// Returns `None` for plain business payloads. A value tagged `input_user` or
    /// `command` that does not match its shape is a `Validation` error.
    pub fn from_value(value: &Value) -> Result<Option<Self>, A2AError> {
        match value.get("type").and_then(Value::as_str) {
            Some(kind @ ("input_user" | "command")) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| A2AError::Validation(format!("Invalid {} payload: {}", kind, e))),
            _ => Ok(None),
        }
    }

    pub fn to_value(&self) -> Value {
        // Both variants hold plain serde values.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
