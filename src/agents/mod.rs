//! Reference agents served through [`crate::server::RequestHandler`]

pub mod currency;
pub mod tool_agent;

pub use currency::{ConversionRequest, CurrencyExecutor};
pub use tool_agent::{
    AgentModel, Conversation, ModelStep, Tool, ToolAgentExecutor, ToolContext, ToolDefinition,
    Turn,
};
