//! Task and checkpoint persistence
//!
//! Both stores are narrow async traits so a database backend can replace the
//! in-memory implementations without touching the request handler.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::protocol::{error::A2AResult, task::Task};

/// Storage for task snapshots
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create or replace a task
    async fn save(&self, task: &Task) -> A2AResult<()>;

    /// Fetch a task by id
    async fn get(&self, task_id: &str) -> A2AResult<Option<Task>>;

    /// Most recently saved task of a context
    async fn latest_for_context(&self, context_id: &str) -> A2AResult<Option<Task>>;
}

/// Storage for executor state that must survive an interrupt
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, context_id: &str, state: Value) -> A2AResult<()>;

    /// Returns `None` when nothing was saved for the context
    async fn load(&self, context_id: &str) -> A2AResult<Option<Value>>;
}

#[derive(Default)]
struct TaskTable {
    tasks: HashMap<String, Task>,
    latest_by_context: HashMap<String, String>,
}

/// In-memory task store
///
/// Tasks are kept for the lifetime of the process.
#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    table: Arc<RwLock<TaskTable>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tasks
    pub async fn len(&self) -> usize {
        self.table.read().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save(&self, task: &Task) -> A2AResult<()> {
        let mut table = self.table.write().await;
        table
            .latest_by_context
            .insert(task.context_id.clone(), task.id.clone());
        table.tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn get(&self, task_id: &str) -> A2AResult<Option<Task>> {
        Ok(self.table.read().await.tasks.get(task_id).cloned())
    }

    async fn latest_for_context(&self, context_id: &str) -> A2AResult<Option<Task>> {
        let table = self.table.read().await;
        Ok(table
            .latest_by_context
            .get(context_id)
            .and_then(|task_id| table.tasks.get(task_id))
            .cloned())
    }
}

/// In-memory checkpoint store keyed by context id
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    states: Arc<RwLock<HashMap<String, Value>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, context_id: &str, state: Value) -> A2AResult<()> {
        self.states
            .write()
            .await
            .insert(context_id.to_string(), state);
        Ok(())
    }

    async fn load(&self, context_id: &str) -> A2AResult<Option<Value>> {
        Ok(self.states.read().await.get(context_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::protocol::{message::Message, task::TaskState};

    use super::*;

    #[tokio::test]
    async fn test_task_store_roundtrip() {
        let store = InMemoryTaskStore::new();
        let task = Task::new("t1", "c1", Message::user("hi"));

        store.save(&task).await.unwrap();

        assert_eq!(store.get("t1").await.unwrap(), Some(task));
        assert!(store.get("missing").await.unwrap().is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_latest_for_context() {
        let store = InMemoryTaskStore::new();
        let first = Task::new("t1", "c1", Message::user("one"));
        let mut second = Task::new("t2", "c1", Message::user("two"));
        second.status.state = TaskState::Working;

        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();

        let latest = store.latest_for_context("c1").await.unwrap().unwrap();
        assert_eq!(latest.id, "t2");
        assert!(store.latest_for_context("c2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_checkpoint_store() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.load("c1").await.unwrap().is_none());

        store.save("c1", json!({"turns": 1})).await.unwrap();
        store.save("c1", json!({"turns": 2})).await.unwrap();

        assert_eq!(store.load("c1").await.unwrap(), Some(json!({"turns": 2})));
    }
}
