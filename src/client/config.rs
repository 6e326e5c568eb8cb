//! Client configuration

use std::time::Duration;

use crate::{
    protocol::operation::EXTENDED_AGENT_CARD_PATH,
    transport::http::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT},
};

/// Configuration for an A2A client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the agent
    pub agent_url: String,

    /// Time allowed to establish a connection
    pub connect_timeout: Duration,

    /// Longest silence tolerated while waiting for the next response bytes or event
    pub read_timeout: Duration,

    /// Enable response validation
    pub validate_responses: bool,

    /// Path of the authenticated extended card
    pub extended_card_path: String,
}

impl ClientConfig {
    /// Create a new client configuration
    pub fn new(agent_url: impl Into<String>) -> Self {
        Self {
            agent_url: agent_url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            validate_responses: true,
            extended_card_path: EXTENDED_AGENT_CARD_PATH.to_string(),
        }
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Enable or disable response validation
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_responses = enabled;
        self
    }

    /// Serve the extended card from another path
    pub fn with_extended_card_path(mut self, path: impl Into<String>) -> Self {
        self.extended_card_path = path.into();
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("")
    }
}
