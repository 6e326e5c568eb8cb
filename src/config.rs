//! Dispatcher configuration
//!
//! Values come from an optional TOML file, then from `A2A_*` environment variables.
//!
//! ```toml
//! agent_urls = ["http://localhost:9999/", "http://localhost:10000/"]
//! auth_token = "my_secret_token"
//! read_timeout_secs = 60
//! ```

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

use crate::{
    protocol::{error::A2AError, operation::EXTENDED_AGENT_CARD_PATH},
    registry::HttpConnector,
};

pub const ENV_AGENT_URLS: &str = "A2A_AGENT_URLS";
pub const ENV_AUTH_TOKEN: &str = "A2A_AUTH_TOKEN";
pub const ENV_READ_TIMEOUT_SECS: &str = "A2A_READ_TIMEOUT_SECS";
pub const ENV_MAX_INTERRUPT_ROUNDS: &str = "A2A_MAX_INTERRUPT_ROUNDS";

/// Settings for discovering and calling remote agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Base URLs to discover agents from
    pub agent_urls: Vec<Url>,

    /// Bearer credential unlocking private cards
    pub auth_token: Option<String>,

    pub connect_timeout_secs: u64,

    /// Longest silence tolerated on an event stream
    pub read_timeout_secs: u64,

    /// Interrupts answered per call before giving up
    pub max_interrupt_rounds: usize,

    pub extended_card_path: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            agent_urls: Vec::new(),
            auth_token: None,
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            max_interrupt_rounds: 8,
            extended_card_path: EXTENDED_AGENT_CARD_PATH.to_string(),
        }
    }
}

impl DispatcherConfig {
    /// Load from an optional file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, A2AError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, A2AError> {
        let contents = std::fs::read_to_string(path).map_err(|source| A2AError::File {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, A2AError> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| A2AError::Config(format!("Invalid dispatcher config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup such as `std::env::var`
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, A2AError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(urls) = lookup(ENV_AGENT_URLS) {
            self.agent_urls = parse_urls(&urls)?;
        }
        if let Some(token) = lookup(ENV_AUTH_TOKEN) {
            self.auth_token = Some(token).filter(|t| !t.is_empty());
        }
        if let Some(secs) = lookup(ENV_READ_TIMEOUT_SECS) {
            self.read_timeout_secs = parse_number(ENV_READ_TIMEOUT_SECS, &secs)?;
        }
        if let Some(rounds) = lookup(ENV_MAX_INTERRUPT_ROUNDS) {
            self.max_interrupt_rounds = parse_number(ENV_MAX_INTERRUPT_ROUNDS, &rounds)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), A2AError> {
        if self.connect_timeout_secs == 0 || self.read_timeout_secs == 0 {
            return Err(A2AError::Config("Timeouts must be at least one second".into()));
        }
        if !self.extended_card_path.starts_with('/') {
            return Err(A2AError::Config(format!(
                "Extended card path must start with '/': {}",
                self.extended_card_path
            )));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// HTTP connector carrying these timeouts
    pub fn connector(&self) -> HttpConnector {
        HttpConnector::new()
            .with_connect_timeout(self.connect_timeout())
            .with_timeout(self.read_timeout())
            .with_extended_card_path(self.extended_card_path.clone())
    }
}

fn parse_urls(value: &str) -> Result<Vec<Url>, A2AError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Url::parse(s).map_err(|e| {
                A2AError::Config(format!("Invalid URL in {}: {} ({})", ENV_AGENT_URLS, s, e))
            })
        })
        .collect()
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, A2AError> {
    value
        .trim()
        .parse()
        .map_err(|_| A2AError::Config(format!("{} must be a non-negative integer, got {:?}", key, value)))
}

/// Install a fmt subscriber filtered by `RUST_LOG`
///
/// Does nothing when a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tower_a2a_dispatch=info"));

    let _ = fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DispatcherConfig::default();
        assert_eq!(config.read_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_interrupt_rounds, 8);
        assert_eq!(config.extended_card_path, "/agent/authenticatedExtendedCard");
    }

    #[test]
    fn test_toml_with_partial_fields() {
        let config = DispatcherConfig::from_toml_str(
            r#"
            agent_urls = ["http://localhost:9999/"]
            auth_token = "my_secret_token"
            read_timeout_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.agent_urls[0].as_str(), "http://localhost:9999/");
        assert_eq!(config.auth_token.as_deref(), Some("my_secret_token"));
        assert_eq!(config.read_timeout_secs, 60);
        assert_eq!(config.connect_timeout_secs, 10);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            DispatcherConfig::from_toml_str("agent_urls = [\"not a url\"]"),
            Err(A2AError::Config(_))
        ));
        assert!(matches!(
            DispatcherConfig::from_toml_str("read_timeout_secs = 0"),
            Err(A2AError::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let config = DispatcherConfig::default()
            .with_overrides(env(&[
                (ENV_AGENT_URLS, "http://a.local/, http://b.local/"),
                (ENV_AUTH_TOKEN, "tok"),
                (ENV_MAX_INTERRUPT_ROUNDS, "3"),
            ]))
            .unwrap();

        assert_eq!(config.agent_urls.len(), 2);
        assert_eq!(config.agent_urls[1].host_str(), Some("b.local"));
        assert_eq!(config.auth_token.as_deref(), Some("tok"));
        assert_eq!(config.max_interrupt_rounds, 3);
    }

    #[test]
    fn test_bad_env_values() {
        let result =
            DispatcherConfig::default().with_overrides(env(&[(ENV_READ_TIMEOUT_SECS, "soon")]));
        assert!(matches!(result, Err(A2AError::Config(_))));

        let result = DispatcherConfig::default().with_overrides(env(&[(ENV_AGENT_URLS, "::")]));
        assert!(matches!(result, Err(A2AError::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = DispatcherConfig::from_file(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(A2AError::File { .. })));
    }

    #[test]
    fn test_init_tracing_twice() {
        init_tracing();
        init_tracing();
    }
}
