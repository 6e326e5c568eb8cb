//! Server side of the protocol: task lifecycle, execution and persistence

pub mod executor;
pub mod handler;
pub mod retry;
pub mod store;
pub mod updater;

pub use executor::{AgentExecutor, ExecutionContext};
pub use handler::{JsonRpcReply, RequestHandler};
pub use retry::{retry, RetryPolicy};
pub use store::{CheckpointStore, InMemoryCheckpointStore, InMemoryTaskStore, TaskStore};
pub use updater::TaskUpdater;
