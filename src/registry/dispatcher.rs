//! Cross-agent dispatch
//!
//! A call submits one message, consumes the event stream until its final chunk and,
//! while the remote task pauses in `input-required`, answers with decisions under the
//! same context id until the task really ends.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex as ContextLock;
use url::Url;
use uuid::Uuid;

use crate::{
    client::{A2AService, AgentClient},
    config::DispatcherConfig,
    protocol::{
        error::{A2AError, A2AResult},
        hitl::{HitlRequest, ResumeCommand},
        message::{Message, Part, Role},
        task::TaskState,
    },
    registry::{
        decision::DecisionSource,
        directory::{AgentRegistry, Connector},
    },
};

/// Default cap on interrupt rounds per call
pub const DEFAULT_MAX_INTERRUPT_ROUNDS: usize = 8;

/// One call to a registered agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    /// Exact card name of the target agent
    pub agent_name: String,

    pub query: String,

    /// Structured payload sent as a data part
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Local file attached as base64 bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    /// Conversation to continue; a fresh one is started when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

impl CallRequest {
    pub fn new(agent_name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }
}

/// Name, description and skills of a registered agent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSummary {
    pub name: String,
    pub description: String,
    pub skills: Vec<String>,
}

struct Discovery {
    connector: Arc<dyn Connector>,
    urls: Vec<Url>,
    credential: Option<String>,
}

enum Outcome {
    Completed(String),
    Interrupted(HitlRequest),
}

/// Calls registered agents by name
pub struct Dispatcher {
    registry: RwLock<AgentRegistry>,
    discovery: Option<Discovery>,
    decisions: Arc<dyn DecisionSource>,
    max_interrupt_rounds: usize,
    contexts: ContextMap,
}

impl Dispatcher {
    /// Dispatch over a fixed registry
    pub fn new(registry: AgentRegistry, decisions: impl DecisionSource + 'static) -> Self {
        Self {
            registry: RwLock::new(registry),
            discovery: None,
            decisions: Arc::new(decisions),
            max_interrupt_rounds: DEFAULT_MAX_INTERRUPT_ROUNDS,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    /// Discover agents at `urls` and remember how, so [`Dispatcher::rediscover`] works
    pub async fn discover(
        connector: impl Connector + 'static,
        urls: Vec<Url>,
        credential: Option<String>,
        decisions: impl DecisionSource + 'static,
    ) -> Self {
        let connector: Arc<dyn Connector> = Arc::new(connector);
        let registry =
            AgentRegistry::discover(connector.as_ref(), &urls, credential.as_deref()).await;

        let mut dispatcher = Self::new(registry, decisions);
        dispatcher.discovery = Some(Discovery {
            connector,
            urls,
            credential,
        });
        dispatcher
    }

    /// Discover over HTTP using the configured URLs, credential and limits
    pub async fn from_config(
        config: &DispatcherConfig,
        decisions: impl DecisionSource + 'static,
    ) -> Self {
        Self::discover(
            config.connector(),
            config.agent_urls.clone(),
            config.auth_token.clone(),
            decisions,
        )
        .await
        .with_max_interrupt_rounds(config.max_interrupt_rounds)
    }

    pub fn with_max_interrupt_rounds(mut self, rounds: usize) -> Self {
        self.max_interrupt_rounds = rounds;
        self
    }

    /// Current registry snapshot
    pub fn registry(&self) -> AgentRegistry {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Registered agents, sorted by name
    pub fn agents(&self) -> Vec<AgentSummary> {
        let registry = self.registry();
        registry
            .names()
            .into_iter()
            .filter_map(|name| registry.get(&name))
            .map(|entry| AgentSummary {
                name: entry.card.name.clone(),
                description: entry.card.description.clone(),
                skills: entry.card.skill_names(),
            })
            .collect()
    }

    /// Rebuild the registry from the original URLs and swap it in
    ///
    /// Calls already in flight keep the entry they started with.
    pub async fn rediscover(&self) -> A2AResult<usize> {
        let discovery = self.discovery.as_ref().ok_or_else(|| {
            A2AError::Config("Dispatcher was not built from discovery".into())
        })?;

        let fresh = AgentRegistry::discover(
            discovery.connector.as_ref(),
            &discovery.urls,
            discovery.credential.as_deref(),
        )
        .await;
        let count = fresh.len();

        *self.registry.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        Ok(count)
    }

    /// Call an agent and return the text of its final answer
    ///
    /// Calls sharing a context id run one after the other.
    pub async fn call(&self, request: CallRequest) -> A2AResult<String> {
        let entry = self
            .registry()
            .get(&request.agent_name)
            .cloned()
            .ok_or_else(|| A2AError::AgentNotFound {
                name: request.agent_name.clone(),
            })?;

        let context_id = request
            .context_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let slot = ContextSlot::claim(&self.contexts, &context_id);
        let _turn = slot.lock.lock().await;

        let message = build_message(&request, &context_id).await?;
        let text = self
            .drive(entry.client, &request.agent_name, &context_id, message)
            .await?;
        Ok(text)
    }

    /// Like [`Dispatcher::call`], with failures rendered as `Error: ...` text
    pub async fn call_text(&self, request: CallRequest) -> String {
        let agent = request.agent_name.clone();
        match self.call(request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(agent = %agent, error = %e, "agent call failed");
                format!("Error: {}", e)
            }
        }
    }

    async fn drive(
        &self,
        mut client: AgentClient<A2AService>,
        agent: &str,
        context_id: &str,
        first: Message,
    ) -> A2AResult<String> {
        let mut message = first;
        let mut rounds = 0;

        loop {
            match submit(&mut client, message, agent, context_id).await? {
                Outcome::Completed(text) => {
                    tracing::info!(agent = %agent, context_id = %context_id, rounds, "agent call completed");
                    return Ok(text);
                }
                Outcome::Interrupted(request) => {
                    if rounds >= self.max_interrupt_rounds {
                        tracing::error!(agent = %agent, context_id = %context_id, rounds, "interrupt limit reached");
                        return Err(A2AError::InterruptLimitExceeded { rounds });
                    }
                    rounds += 1;
                    tracing::info!(
                        agent = %agent,
                        context_id = %context_id,
                        round = rounds,
                        actions = request.action_requests.len(),
                        "agent requested decisions"
                    );

                    let command = ResumeCommand::new(self.decisions.resolve(&request).await?);
                    command.validate_against(&request)?;
                    message = command.into_message(context_id);
                }
            }
        }
    }
}

type ContextMap = Mutex<HashMap<String, Arc<ContextLock<()>>>>;

/// Per-context lock entry, removed from the map once its last holder goes away
///
/// Dropping the slot also covers early returns and callers that drop the `call` future.
struct ContextSlot<'a> {
    contexts: &'a ContextMap,
    context_id: &'a str,
    lock: Arc<ContextLock<()>>,
}

impl<'a> ContextSlot<'a> {
    fn claim(contexts: &'a ContextMap, context_id: &'a str) -> Self {
        let lock = contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(context_id.to_string())
            .or_default()
            .clone();
        Self {
            contexts,
            context_id,
            lock,
        }
    }
}

impl Drop for ContextSlot<'_> {
    fn drop(&mut self) {
        let mut contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map and this slot hold it: nobody is waiting.
        if Arc::strong_count(&self.lock) == 2 {
            contexts.remove(self.context_id);
        }
    }
}

/// Submit one message and wait for its final chunk
async fn submit(
    client: &mut AgentClient<A2AService>,
    message: Message,
    agent: &str,
    context_id: &str,
) -> A2AResult<Outcome> {
    let mut chunks = client.stream_chunks(message).await?;

    while let Some(chunk) = chunks.next_chunk().await {
        let chunk = chunk?;
        if !chunk.is_final {
            tracing::debug!(agent = %agent, context_id = %context_id, text = %chunk.text, "progress");
            continue;
        }

        let text = chunks.final_text().unwrap_or(&chunk.text).to_string();
        if text.is_empty() {
            tracing::error!(agent = %agent, task_id = ?chunk.task_id, state = ?chunk.state, "final event without a message");
            return Err(A2AError::Protocol(
                "Final event carried no message".into(),
            ));
        }

        return match chunk.state {
            Some(TaskState::InputRequired) => HitlRequest::from_text(&text).map(Outcome::Interrupted),
            Some(state @ (TaskState::Failed | TaskState::Canceled)) => Err(A2AError::RemoteTask {
                state,
                message: text,
            }),
            _ => Ok(Outcome::Completed(text)),
        };
    }

    tracing::error!(agent = %agent, context_id = %context_id, task_id = ?chunks.task_id(), "stream ended without a final event");
    Err(A2AError::Protocol(
        "Stream ended without a final event".into(),
    ))
}

async fn build_message(request: &CallRequest, context_id: &str) -> A2AResult<Message> {
    let mut builder = Message::builder()
        .role(Role::User)
        .context_id(context_id)
        .part(Part::text(request.query.clone()));

    if let Some(data) = &request.data {
        builder = builder.part(Part::data(data.clone()));
    }
    if let Some(path) = &request.file_path {
        builder = builder.part(file_part(path).await?);
    }

    Ok(builder.build())
}

/// Read a file into a base64 file part with a guessed MIME type
pub async fn file_part(path: &Path) -> A2AResult<Part> {
    let bytes = tokio::fs::read(path).await.map_err(|source| A2AError::File {
        path: path.to_path_buf(),
        source,
    })?;

    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());

    Ok(Part::file_bytes(name, STANDARD.encode(bytes), mime.to_string()))
}
