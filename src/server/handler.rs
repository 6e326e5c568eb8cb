//! Request handler: the server side of the task lifecycle
//!
//! The handler owns task creation, resume by context, execution supervision and
//! cancellation. Whatever happens inside an executor, every stream it returns ends
//! with exactly one final event.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use futures::{stream::BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::{
    sync::mpsc,
    task::{AbortHandle, JoinError},
};
use uuid::Uuid;

use crate::{
    codec::jsonrpc::{
        JsonRpcError, JsonRpcRequest, JsonRpcResponse, METHOD_CANCEL_TASK, METHOD_EXTENDED_CARD,
        METHOD_GET_TASK, METHOD_SEND, METHOD_STREAM,
    },
    protocol::{
        agent::AgentCard,
        error::{A2AError, A2AResult},
        event::StreamEvent,
        message::Message,
        task::{Task, TaskState, TaskStatus},
    },
    server::{
        executor::{AgentExecutor, ExecutionContext},
        store::{InMemoryTaskStore, TaskStore},
        updater::TaskUpdater,
    },
    service::response::EventStream,
};

const CANCELED_TEXT: &str = "Task canceled by request";

struct RunningTask {
    updater: TaskUpdater,
    abort: AbortHandle,
}

type RunningTasks = Arc<Mutex<HashMap<String, RunningTask>>>;

/// Reply to one JSON-RPC request
pub enum JsonRpcReply {
    Single(JsonRpcResponse),

    /// One response per stream event, for `message/stream`
    Stream(BoxStream<'static, JsonRpcResponse>),
}

/// Serves one agent: cards, message execution, task queries and cancellation
pub struct RequestHandler {
    card: AgentCard,
    extended_card: Option<AgentCard>,
    credential: Option<String>,
    executor: Arc<dyn AgentExecutor>,
    store: Arc<dyn TaskStore>,
    running: RunningTasks,
}

impl RequestHandler {
    /// Create a handler with an in-memory task store
    pub fn new(card: AgentCard, executor: impl AgentExecutor) -> Self {
        Self {
            card,
            extended_card: None,
            credential: None,
            executor: Arc::new(executor),
            store: Arc::new(InMemoryTaskStore::new()),
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_task_store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = store;
        self
    }

    /// Serve an extended card to callers presenting a bearer token
    ///
    /// With `credential` set only that token is accepted; otherwise any bearer token is.
    pub fn with_extended_card(mut self, card: AgentCard, credential: Option<String>) -> Self {
        self.card.supports_authenticated_extended_card = true;
        self.extended_card = Some(card);
        self.credential = credential;
        self
    }

    /// Public agent card
    pub fn agent_card(&self) -> AgentCard {
        self.card.clone()
    }

    /// Authenticated extended card
    ///
    /// # Errors
    ///
    /// `A2AError::Auth` when the token is missing or does not match.
    pub fn extended_agent_card(&self, bearer_token: Option<&str>) -> A2AResult<AgentCard> {
        let card = self.extended_card.as_ref().ok_or_else(|| {
            A2AError::Protocol(format!(
                "Agent {} does not provide an authenticated extended card",
                self.card.name
            ))
        })?;

        match (bearer_token, self.credential.as_deref()) {
            (Some(token), Some(expected)) if token == expected => Ok(card.clone()),
            (Some(_), None) => Ok(card.clone()),
            _ => {
                tracing::warn!(agent = %self.card.name, "rejected extended card request");
                Err(A2AError::Auth("Missing or invalid bearer token".into()))
            }
        }
    }

    /// Execute a message and stream the task's events
    ///
    /// A message whose context has a task waiting in `input-required` resumes that
    /// task; any other message starts a new task. The first event is always the task
    /// snapshot in the `working` state and the last one is always final.
    pub async fn send_message_stream(&self, message: Message) -> A2AResult<EventStream> {
        if message.parts.is_empty() {
            return Err(A2AError::Validation(
                "Message must contain at least one part".into(),
            ));
        }

        let context_id = message
            .context_id
            .clone()
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        let message = message.with_context_id(context_id.clone());

        let paused = self
            .store
            .latest_for_context(&context_id)
            .await?
            .filter(Task::requires_input);

        let (mut task, resumed) = match paused {
            Some(mut task) => {
                task.history.push(message.clone());
                (task, true)
            }
            None => (
                Task::new(Uuid::now_v7().to_string(), context_id.clone(), message.clone()),
                false,
            ),
        };
        task.transition(TaskStatus::new(TaskState::Working))?;
        self.store.save(&task).await?;

        tracing::info!(
            agent = %self.card.name,
            task_id = %task.id,
            context_id = %context_id,
            resumed,
            "starting task"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let updater = TaskUpdater::new(task.clone(), self.store.clone(), tx);
        updater.emit_snapshot().await?;

        let context = ExecutionContext {
            task,
            message,
            resumed,
        };
        let executor = self.executor.clone();
        let worker_updater = updater.clone();
        let worker = tokio::spawn(async move { executor.execute(context, worker_updater).await });

        self.running_tasks().insert(
            updater.task_id().to_string(),
            RunningTask {
                updater: updater.clone(),
                abort: worker.abort_handle(),
            },
        );
        tokio::spawn(supervise(worker, updater, self.running.clone()));

        Ok(events_until_final(rx))
    }

    /// Execute a message and wait for the final task snapshot
    pub async fn send_message(&self, message: Message) -> A2AResult<Task> {
        let mut events = self.send_message_stream(message).await?;

        let mut task_id = None;
        while let Some(event) = events.next().await {
            let event = event?;
            if task_id.is_none() {
                task_id = event.task_id().map(str::to_string);
            }
        }

        let task_id = task_id
            .ok_or_else(|| A2AError::Protocol("Task stream ended without events".into()))?;
        self.get_task(&task_id).await
    }

    pub async fn get_task(&self, task_id: &str) -> A2AResult<Task> {
        self.store
            .get(task_id)
            .await?
            .ok_or_else(|| A2AError::TaskNotFound {
                task_id: task_id.to_string(),
            })
    }

    /// Cancel a task that has not reached a terminal state
    ///
    /// A running task gets exactly one `canceled` final event and its executor is
    /// aborted. Cancel loses to a final status emitted before it.
    pub async fn cancel_task(&self, task_id: &str) -> A2AResult<Task> {
        let running = self
            .running_tasks()
            .get(task_id)
            .map(|running| running.updater.clone());

        let Some(updater) = running else {
            return self.cancel_idle(task_id).await;
        };

        match updater.cancel(CANCELED_TEXT).await {
            Ok(()) => {
                if let Some(running) = self.running_tasks().get(task_id) {
                    if running.updater.ptr_eq(&updater) {
                        running.abort.abort();
                    }
                }
                tracing::info!(task_id, "task canceled");
                Ok(updater.snapshot().await)
            }
            Err(A2AError::TaskFinalized { .. }) => {
                let task = updater.snapshot().await;
                if task.requires_input() {
                    // Paused; the executor is winding down and holds nothing to abort.
                    return self.cancel_idle(task_id).await;
                }
                Err(A2AError::TaskNotCancelable {
                    task_id: task_id.to_string(),
                    state: task.status.state,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Cancel a task with no executor attached, e.g. one paused for input
    async fn cancel_idle(&self, task_id: &str) -> A2AResult<Task> {
        let mut task = self.get_task(task_id).await?;
        if task.is_terminal() {
            return Err(A2AError::TaskNotCancelable {
                task_id: task_id.to_string(),
                state: task.status.state,
            });
        }

        let message = Message::agent(CANCELED_TEXT)
            .with_context_id(task.context_id.clone())
            .with_task_id(task.id.clone());
        task.transition(TaskStatus::new(TaskState::Canceled).with_message(message))?;
        self.store.save(&task).await?;

        tracing::info!(task_id, "idle task canceled");
        Ok(task)
    }

    /// Dispatch one JSON-RPC request
    ///
    /// `bearer_token` is the credential presented with the request, used by the
    /// extended card method.
    pub async fn handle_jsonrpc(
        &self,
        request: JsonRpcRequest,
        bearer_token: Option<&str>,
    ) -> JsonRpcReply {
        let id = request.id.clone();
        tracing::debug!(agent = %self.card.name, method = %request.method, "JSON-RPC request");

        if request.method == METHOD_STREAM {
            let stream = match param::<Message>(&request.params, "message") {
                Ok(message) => self.send_message_stream(message).await,
                Err(e) => Err(e),
            };

            return match stream {
                Ok(events) => JsonRpcReply::Stream(
                    events
                        .map(move |event| {
                            let id = id.clone();
                            match event.and_then(to_value) {
                                Ok(value) => JsonRpcResponse::success(id, value),
                                Err(e) => JsonRpcResponse::failure(id, &e),
                            }
                        })
                        .boxed(),
                ),
                Err(e) => JsonRpcReply::Single(JsonRpcResponse::failure(id, &e)),
            };
        }

        let result = match request.method.as_str() {
            METHOD_SEND => match param::<Message>(&request.params, "message") {
                Ok(message) => self.send_message(message).await.and_then(to_value),
                Err(e) => Err(e),
            },
            METHOD_GET_TASK => match param::<String>(&request.params, "id") {
                Ok(task_id) => self.get_task(&task_id).await.and_then(to_value),
                Err(e) => Err(e),
            },
            METHOD_CANCEL_TASK => match param::<String>(&request.params, "id") {
                Ok(task_id) => self.cancel_task(&task_id).await.and_then(to_value),
                Err(e) => Err(e),
            },
            METHOD_EXTENDED_CARD => self.extended_agent_card(bearer_token).and_then(to_value),
            other => {
                return JsonRpcReply::Single(JsonRpcResponse::error(
                    id,
                    JsonRpcError::method_not_found(other),
                ))
            }
        };

        JsonRpcReply::Single(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::failure(id, &e),
        })
    }

    fn running_tasks(&self) -> std::sync::MutexGuard<'_, HashMap<String, RunningTask>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Wait for the executor and guarantee a final event
async fn supervise(
    worker: tokio::task::JoinHandle<A2AResult<()>>,
    updater: TaskUpdater,
    running: RunningTasks,
) {
    let outcome = worker.await;
    {
        let mut running = running.lock().unwrap_or_else(PoisonError::into_inner);
        // A resumed run may already have registered under the same task id.
        if running
            .get(updater.task_id())
            .is_some_and(|r| r.updater.ptr_eq(&updater))
        {
            running.remove(updater.task_id());
        }
    }

    if updater.is_finalized().await {
        if let Ok(Err(e)) = &outcome {
            tracing::debug!(task_id = %updater.task_id(), error = %e, "executor error after final status");
        }
        return;
    }

    let text = match outcome {
        Ok(Ok(())) => {
            tracing::warn!(task_id = %updater.task_id(), "executor returned without a final status");
            "Agent finished without a final status".to_string()
        }
        Ok(Err(A2AError::Validation(message))) => {
            tracing::info!(task_id = %updater.task_id(), %message, "request rejected");
            message
        }
        Ok(Err(e)) => {
            tracing::error!(task_id = %updater.task_id(), error = %e, "executor failed");
            format!("Internal error: {}", e)
        }
        Err(join_error) => panic_text(&updater, join_error),
    };

    if let Err(e) = updater.fail(text).await {
        tracing::debug!(task_id = %updater.task_id(), error = %e, "could not emit failure");
    }
}

fn panic_text(updater: &TaskUpdater, join_error: JoinError) -> String {
    if join_error.is_cancelled() {
        tracing::warn!(task_id = %updater.task_id(), "executor aborted before a final status");
        return "Agent execution was aborted".to_string();
    }

    tracing::error!(task_id = %updater.task_id(), error = %join_error, "executor panicked");
    "Internal error: agent execution panicked".to_string()
}

/// Events from the channel up to and including the first final one
fn events_until_final(rx: mpsc::UnboundedReceiver<StreamEvent>) -> EventStream {
    futures::stream::unfold((rx, false), |(mut rx, done)| async move {
        if done {
            return None;
        }
        let event = rx.recv().await?;
        let done = event.is_final();
        Some((Ok(event), (rx, done)))
    })
    .boxed()
}

fn param<T: DeserializeOwned>(params: &Value, key: &str) -> A2AResult<T> {
    let value = params
        .get(key)
        .ok_or_else(|| A2AError::Validation(format!("Missing parameter '{}'", key)))?;
    serde_json::from_value(value.clone())
        .map_err(|e| A2AError::Validation(format!("Invalid parameter '{}': {}", key, e)))
}

fn to_value<T: serde::Serialize>(value: T) -> A2AResult<Value> {
    Ok(serde_json::to_value(value)?)
}
