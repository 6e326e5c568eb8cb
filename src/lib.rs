//! # Tower A2A Dispatch
//!
//! Agent2Agent (A2A) task lifecycle, streaming consumption and cross-agent dispatch,
//! built on Tower's Service and Layer abstractions.
//!
//! - **Server side**: [`server::RequestHandler`] runs an [`server::AgentExecutor`] per
//!   task and guarantees that every event stream ends with exactly one final event,
//!   whether the executor completes, fails, panics or is canceled.
//! - **Client side**: [`client::AgentClient`] speaks JSON-RPC over HTTP + SSE (or
//!   in-process through [`transport::LocalTransport`]) and [`client::StreamConsumer`]
//!   turns the events into text chunks.
//! - **Dispatch**: [`registry::Dispatcher`] discovers agents from their cards, calls
//!   them by name and answers `input-required` interrupts from a
//!   [`registry::DecisionSource`] until the remote task really ends.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tower_a2a_dispatch::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DispatcherConfig::load(None)?;
//!     let dispatcher = Dispatcher::from_config(&config, AutoApprove).await;
//!
//!     let answer = dispatcher
//!         .call(
//!             CallRequest::new("CurrencyExpert", "Convert currency")
//!                 .with_data(serde_json::json!({"amount": 100, "from": "USD", "to": "VND"})),
//!         )
//!         .await?;
//!     println!("{}", answer);
//!
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod client;
pub mod codec;
pub mod config;
pub mod layer;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod service;
pub mod transport;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        client::{A2AClientBuilder, AgentClient, Chunk, StreamConsumer},
        config::DispatcherConfig,
        protocol::error::{A2AError, A2AResult},
        protocol::{
            A2AOperation, AgentCard, Decision, HitlRequest, Message, Part, Role, StreamEvent,
            Task, TaskState, TaskStatus,
        },
        registry::{AutoApprove, CallRequest, DecisionSource, Dispatcher},
        server::{AgentExecutor, ExecutionContext, RequestHandler, TaskUpdater},
        transport::LocalTransport,
    };
}
