//! Agent directory built from capability cards

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use futures::future::join_all;
use url::Url;

use crate::{
    client::{A2AClientBuilder, A2AService, AgentClient},
    protocol::{
        agent::AgentCard,
        error::{A2AError, A2AResult},
        operation::EXTENDED_AGENT_CARD_PATH,
    },
    transport::http::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT},
};

/// Which card an entry was registered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentScope {
    Public,
    Private,
}

impl fmt::Display for AgentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentScope::Public => write!(f, "public"),
            AgentScope::Private => write!(f, "private"),
        }
    }
}

/// A callable agent
///
/// Public and private entries discovered from the same URL share one client.
#[derive(Clone)]
pub struct RegistryEntry {
    pub card: AgentCard,
    pub client: AgentClient<A2AService>,
    pub url: Url,
    pub scope: AgentScope,
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.card.name)
            .field("url", &self.url.as_str())
            .field("scope", &self.scope)
            .finish()
    }
}

/// Builds the client used to reach one agent URL
pub trait Connector: Send + Sync {
    fn connect(&self, url: &Url, credential: Option<&str>) -> A2AResult<AgentClient<A2AService>>;
}

impl<F> Connector for F
where
    F: Fn(&Url, Option<&str>) -> A2AResult<AgentClient<A2AService>> + Send + Sync,
{
    fn connect(&self, url: &Url, credential: Option<&str>) -> A2AResult<AgentClient<A2AService>> {
        self(url, credential)
    }
}

/// Connects over HTTP with the JSON-RPC binding
#[derive(Debug, Clone)]
pub struct HttpConnector {
    connect_timeout: Duration,
    read_timeout: Duration,
    extended_card_path: String,
}

impl HttpConnector {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            extended_card_path: EXTENDED_AGENT_CARD_PATH.to_string(),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_extended_card_path(mut self, path: impl Into<String>) -> Self {
        self.extended_card_path = path.into();
        self
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for HttpConnector {
    fn connect(&self, url: &Url, credential: Option<&str>) -> A2AResult<AgentClient<A2AService>> {
        let mut builder = A2AClientBuilder::new_http(url.clone())
            .with_connect_timeout(self.connect_timeout)
            .with_timeout(self.read_timeout)
            .with_extended_card_path(self.extended_card_path.clone());
        if let Some(token) = credential {
            builder = builder.with_bearer_auth(token);
        }
        builder.build()
    }
}

/// Immutable map from card name to entry
///
/// Cloning is cheap. Rediscovery builds a new registry instead of touching this one.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    entries: Arc<HashMap<String, RegistryEntry>>,
}

impl AgentRegistry {
    /// Register entries by card name; later entries replace earlier ones
    pub fn from_entries(entries: impl IntoIterator<Item = RegistryEntry>) -> Self {
        let mut map = HashMap::new();
        for entry in entries {
            if let Some(previous) = map.insert(entry.card.name.clone(), entry) {
                tracing::warn!(
                    agent = %previous.card.name,
                    url = %previous.url,
                    "agent name registered twice, keeping the later card"
                );
            }
        }
        Self {
            entries: Arc::new(map),
        }
    }

    /// Fetch cards from every URL concurrently
    ///
    /// A URL that fails discovery is logged and skipped.
    pub async fn discover(connector: &dyn Connector, urls: &[Url], credential: Option<&str>) -> Self {
        let results = join_all(
            urls.iter()
                .map(|url| discover_one(connector, url, credential)),
        )
        .await;

        let mut entries = Vec::new();
        for (url, result) in urls.iter().zip(results) {
            match result {
                Ok(found) => entries.extend(found),
                Err(e) => tracing::warn!(url = %url, error = %e, "agent discovery failed"),
            }
        }

        let registry = Self::from_entries(entries);
        tracing::info!(agents = registry.len(), "agent discovery finished");
        registry
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Discover the public card and, when unlocked, the private one
pub async fn discover_one(
    connector: &dyn Connector,
    url: &Url,
    credential: Option<&str>,
) -> A2AResult<Vec<RegistryEntry>> {
    let mut client = connector.connect(url, credential)?;
    let public = client.discover().await?;
    tracing::info!(agent = %public.name, url = %url, "discovered public card");

    let mut entries = Vec::with_capacity(2);
    let private = match (public.supports_authenticated_extended_card, credential) {
        (true, Some(_)) => match client.discover_extended().await {
            Ok(card) => Some(card),
            Err(A2AError::Auth(e)) => {
                tracing::warn!(agent = %public.name, error = %e, "extended card refused");
                None
            }
            Err(e) => return Err(e),
        },
        _ => None,
    };

    entries.push(RegistryEntry {
        card: public,
        client: client.clone(),
        url: url.clone(),
        scope: AgentScope::Public,
    });
    if let Some(card) = private {
        tracing::info!(agent = %card.name, url = %url, "discovered private card");
        entries.push(RegistryEntry {
            card,
            client,
            url: url.clone(),
            scope: AgentScope::Private,
        });
    }

    Ok(entries)
}
