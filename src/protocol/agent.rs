//! Agent discovery and capability types

use serde::{Deserialize, Serialize};

/// Agent Card for agent discovery
///
/// The public card is published at `/.well-known/agent-card.json`. Agents that set
/// `supports_authenticated_extended_card` also serve a richer card to callers
/// presenting a bearer credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    /// Name of the agent, used as the registry key
    pub name: String,

    /// Human-readable description of the agent
    pub description: String,

    /// Base URL the agent is served from
    pub url: String,

    /// Agent version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Agent capabilities
    #[serde(default)]
    pub capabilities: AgentCapabilities,

    /// Skills, in the order the agent advertises them
    #[serde(default)]
    pub skills: Vec<AgentSkill>,

    #[serde(default)]
    pub default_input_modes: Vec<String>,

    #[serde(default)]
    pub default_output_modes: Vec<String>,

    /// Whether a private card is available with a bearer credential
    #[serde(default)]
    pub supports_authenticated_extended_card: bool,
}

impl AgentCard {
    /// Create a new agent card
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            url: url.into(),
            version: None,
            capabilities: AgentCapabilities::default(),
            skills: Vec::new(),
            default_input_modes: vec!["text".into()],
            default_output_modes: vec!["text".into()],
            supports_authenticated_extended_card: false,
        }
    }

    /// Set the capabilities
    pub fn with_capabilities(mut self, capabilities: AgentCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Add a skill
    pub fn with_skill(mut self, skill: AgentSkill) -> Self {
        self.skills.push(skill);
        self
    }

    /// Set the agent version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Advertise the authenticated extended card
    pub fn with_extended_card(mut self) -> Self {
        self.supports_authenticated_extended_card = true;
        self
    }

    /// Set the accepted input modes
    pub fn with_input_modes<I, S>(mut self, modes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_input_modes = modes.into_iter().map(Into::into).collect();
        self
    }

    /// Skill names, in order
    pub fn skill_names(&self) -> Vec<String> {
        self.skills.iter().map(|s| s.name.clone()).collect()
    }
}

/// A skill advertised on an agent card
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

impl AgentSkill {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            tags: Vec::new(),
            examples: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }
}

/// Agent capabilities
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    /// Supports streaming responses
    #[serde(default)]
    pub streaming: bool,

    /// Supports push notifications via webhooks
    #[serde(default)]
    pub push_notifications: bool,
}

impl AgentCapabilities {
    /// Create capabilities with default values (all false)
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable streaming
    pub fn with_streaming(mut self) -> Self {
        self.streaming = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> AgentCard {
        AgentCard::new("CurrencyExpert", "Converts money", "http://localhost:9999/")
            .with_capabilities(AgentCapabilities::new().with_streaming())
            .with_skill(
                AgentSkill::new("currency_conversion", "Currency conversion", "USD <-> VND")
                    .with_tags(["finance", "currency"]),
            )
            .with_extended_card()
    }

    #[test]
    fn test_agent_card_creation() {
        let card = card();

        assert_eq!(card.name, "CurrencyExpert");
        assert!(card.capabilities.streaming);
        assert!(card.supports_authenticated_extended_card);
        assert_eq!(card.skill_names(), vec!["Currency conversion".to_string()]);
    }

    #[test]
    fn test_agent_card_serialization() {
        let card = card();

        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["supportsAuthenticatedExtendedCard"], true);
        assert_eq!(json["skills"][0]["tags"][1], "currency");
        assert_eq!(json["capabilities"]["streaming"], true);

        let deserialized: AgentCard = serde_json::from_value(json).unwrap();
        assert_eq!(card, deserialized);
    }

    #[test]
    fn test_minimal_card_defaults() {
        let json = r#"{"name":"Echo","description":"echoes","url":"http://x/"}"#;
        let card: AgentCard = serde_json::from_str(json).unwrap();
        assert!(!card.capabilities.streaming);
        assert!(card.skills.is_empty());
        assert!(!card.supports_authenticated_extended_card);
    }
}
