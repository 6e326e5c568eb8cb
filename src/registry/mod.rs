//! Agent directory and cross-agent dispatch

pub mod decision;
pub mod directory;
pub mod dispatcher;
pub mod tool;

pub use decision::{AutoApprove, ConsoleDecisionSource, DecisionSource, ScriptedDecisions};
pub use directory::{discover_one, AgentRegistry, AgentScope, Connector, HttpConnector, RegistryEntry};
pub use dispatcher::{file_part, AgentSummary, CallRequest, Dispatcher, DEFAULT_MAX_INTERRUPT_ROUNDS};
pub use tool::{CallAgentTool, CALL_AGENT_TOOL};
