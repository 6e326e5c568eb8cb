//! Task updater handed to executors
//!
//! Every event for a task goes through one [`TaskUpdater`]. The updater applies the
//! event to the stored task, then forwards it to the open stream. A mutex guards the
//! whole sequence, so events keep their order and only the first final status wins;
//! later emits fail with `A2AError::TaskFinalized`.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::{
    protocol::{
        error::{A2AError, A2AResult},
        event::{StreamEvent, TaskArtifactUpdateEvent, TaskStatusUpdateEvent},
        hitl::HitlRequest,
        message::{Message, Part},
        task::{Task, TaskState, TaskStatus},
        Artifact,
    },
    server::store::TaskStore,
};

struct GuardState {
    task: Task,
    finalized: bool,
}

struct Inner {
    task_id: String,
    context_id: String,
    state: Mutex<GuardState>,
    store: Arc<dyn TaskStore>,
    events: mpsc::UnboundedSender<StreamEvent>,
}

/// Emits status, artifact and message events for one task
#[derive(Clone)]
pub struct TaskUpdater {
    inner: Arc<Inner>,
}

impl TaskUpdater {
    pub(crate) fn new(
        task: Task,
        store: Arc<dyn TaskStore>,
        events: mpsc::UnboundedSender<StreamEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                task_id: task.id.clone(),
                context_id: task.context_id.clone(),
                state: Mutex::new(GuardState {
                    finalized: task.status.state.is_final(),
                    task,
                }),
                store,
                events,
            }),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.inner.task_id
    }

    pub fn context_id(&self) -> &str {
        &self.inner.context_id
    }

    /// Whether both updaters drive the same execution
    pub(crate) fn ptr_eq(&self, other: &TaskUpdater) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether a final status has been emitted
    pub async fn is_finalized(&self) -> bool {
        self.inner.state.lock().await.finalized
    }

    /// Current task as seen by this updater
    pub async fn snapshot(&self) -> Task {
        self.inner.state.lock().await.task.clone()
    }

    /// Send the current task as a snapshot event
    pub(crate) async fn emit_snapshot(&self) -> A2AResult<()> {
        let guard = self.inner.state.lock().await;
        self.forward(StreamEvent::Task(guard.task.clone()));
        Ok(())
    }

    /// Agent-authored message bound to this task
    pub fn agent_message(&self, text: impl Into<String>) -> Message {
        Message::agent(text)
            .with_context_id(self.inner.context_id.clone())
            .with_task_id(self.inner.task_id.clone())
    }

    /// Report progress in the `working` state
    pub async fn start_work(&self, text: impl Into<String>) -> A2AResult<()> {
        self.status(TaskState::Working, text).await
    }

    /// Move to `state` with an explaining text message
    pub async fn status(&self, state: TaskState, text: impl Into<String>) -> A2AResult<()> {
        let message = self.agent_message(text);
        self.update_status(TaskStatus::new(state).with_message(message))
            .await
    }

    /// Apply a status and emit it
    ///
    /// Final states set the `final` flag on the event and close the task for
    /// further updates.
    pub async fn update_status(&self, status: TaskStatus) -> A2AResult<()> {
        let mut guard = self.inner.state.lock().await;
        if guard.finalized {
            return Err(self.finalized_error());
        }

        guard.task.transition(status.clone())?;
        if let Some(message) = &status.message {
            guard.task.history.push(message.clone());
        }

        let is_final = status.state.is_final();
        if is_final {
            guard.finalized = true;
        }

        let saved = self.inner.store.save(&guard.task).await;

        tracing::debug!(
            task_id = %self.inner.task_id,
            context_id = %self.inner.context_id,
            state = %status.state,
            is_final,
            "task status updated"
        );

        self.forward(StreamEvent::StatusUpdate(TaskStatusUpdateEvent {
            task_id: self.inner.task_id.clone(),
            context_id: self.inner.context_id.clone(),
            status,
            is_final,
        }));

        saved
    }

    /// Publish a named artifact
    pub async fn add_artifact(&self, name: impl Into<String>, parts: Vec<Part>) -> A2AResult<()> {
        let mut guard = self.inner.state.lock().await;
        if guard.finalized {
            return Err(self.finalized_error());
        }

        let artifact = Artifact::new(name, parts);
        guard.task.artifacts.push(artifact.clone());
        let saved = self.inner.store.save(&guard.task).await;

        self.forward(StreamEvent::ArtifactUpdate(TaskArtifactUpdateEvent {
            task_id: self.inner.task_id.clone(),
            context_id: self.inner.context_id.clone(),
            artifact,
            append: false,
            last_chunk: true,
        }));

        saved
    }

    /// Send an ephemeral agent message without changing the task state
    pub async fn send_message(&self, text: impl Into<String>) -> A2AResult<()> {
        let mut guard = self.inner.state.lock().await;
        if guard.finalized {
            return Err(self.finalized_error());
        }

        let message = self.agent_message(text);
        guard.task.history.push(message.clone());
        let saved = self.inner.store.save(&guard.task).await;
        self.forward(StreamEvent::Message(message));
        saved
    }

    pub async fn complete(&self, text: impl Into<String>) -> A2AResult<()> {
        self.status(TaskState::Completed, text).await
    }

    pub async fn fail(&self, text: impl Into<String>) -> A2AResult<()> {
        self.status(TaskState::Failed, text).await
    }

    pub async fn cancel(&self, text: impl Into<String>) -> A2AResult<()> {
        self.status(TaskState::Canceled, text).await
    }

    /// Pause the task until the client sends a decision
    pub async fn require_input(&self, text: impl Into<String>) -> A2AResult<()> {
        self.status(TaskState::InputRequired, text).await
    }

    /// Pause with a serialized interrupt request
    pub async fn interrupt(&self, request: &HitlRequest) -> A2AResult<()> {
        self.require_input(request.to_text()?).await
    }

    fn forward(&self, event: StreamEvent) {
        if self.inner.events.send(event).is_err() {
            // The client went away; the task keeps running and stays queryable.
            tracing::debug!(task_id = %self.inner.task_id, "event stream closed by client");
        }
    }

    fn finalized_error(&self) -> A2AError {
        A2AError::TaskFinalized {
            task_id: self.inner.task_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::server::store::InMemoryTaskStore;

    use super::*;

    fn updater() -> (
        TaskUpdater,
        InMemoryTaskStore,
        mpsc::UnboundedReceiver<StreamEvent>,
    ) {
        let mut task = Task::new("t1", "c1", Message::user("hi"));
        task.transition(TaskStatus::new(TaskState::Working)).unwrap();
        let store = InMemoryTaskStore::new();
        let (tx, rx) = mpsc::unbounded_channel();
        (TaskUpdater::new(task, Arc::new(store.clone()), tx), store, rx)
    }

    #[tokio::test]
    async fn test_events_in_order() {
        let (updater, store, mut rx) = updater();

        updater.emit_snapshot().await.unwrap();
        updater.start_work("working").await.unwrap();
        updater
            .add_artifact("progress", vec![Part::text("half way")])
            .await
            .unwrap();
        updater.complete("done").await.unwrap();

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| (e.kind(), e.is_final()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("task", false),
                ("status-update", false),
                ("artifact-update", false),
                ("status-update", true),
            ]
        );

        let stored = store.get("t1").await.unwrap().unwrap();
        assert_eq!(stored.status.state, TaskState::Completed);
        assert_eq!(stored.artifacts.len(), 1);
    }

    #[tokio::test]
    async fn test_single_final() {
        let (updater, _store, mut rx) = updater();

        updater.cancel("canceled").await.unwrap();
        let err = updater.complete("done").await.unwrap_err();
        assert!(matches!(err, A2AError::TaskFinalized { .. }));
        assert!(updater.send_message("late").await.is_err());
        assert!(updater.is_finalized().await);

        let finals = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(StreamEvent::is_final)
            .count();
        assert_eq!(finals, 1);
        assert_eq!(updater.snapshot().await.status.state, TaskState::Canceled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_races_complete() {
        for _ in 0..50 {
            let (updater, store, mut rx) = updater();
            let canceler = updater.clone();

            let (canceled, completed) = tokio::join!(
                tokio::spawn(async move { canceler.cancel("canceled").await }),
                updater.complete("done"),
            );
            let canceled = canceled.unwrap();
            assert!(canceled.is_ok() != completed.is_ok());

            let finals: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
                .filter(StreamEvent::is_final)
                .collect();
            assert_eq!(finals.len(), 1);

            let winner = if canceled.is_ok() {
                TaskState::Canceled
            } else {
                TaskState::Completed
            };
            assert_eq!(finals[0].state(), Some(winner));
            assert_eq!(store.get("t1").await.unwrap().unwrap().status.state, winner);
        }
    }

    #[tokio::test]
    async fn test_final_requires_text() {
        let (updater, _store, _rx) = updater();

        let err = updater
            .update_status(TaskStatus::new(TaskState::Completed))
            .await
            .unwrap_err();
        assert!(matches!(err, A2AError::Protocol(_)));
        assert!(!updater.is_finalized().await);
    }

    #[tokio::test]
    async fn test_interrupt() {
        let (updater, _store, mut rx) = updater();
        let request = HitlRequest {
            action_requests: vec![crate::protocol::hitl::ActionRequest::new(
                "delete_file",
                Default::default(),
            )],
        };

        updater.interrupt(&request).await.unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.state(), Some(TaskState::InputRequired));
        assert!(event.is_final());
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_not_an_error() {
        let (updater, _store, rx) = updater();
        drop(rx);

        updater.start_work("still running").await.unwrap();
    }
}
