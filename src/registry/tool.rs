//! Exposes the dispatcher as a tool for model-driven agents

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{
    agents::{Tool, ToolContext},
    registry::dispatcher::{CallRequest, Dispatcher},
};

pub const CALL_AGENT_TOOL: &str = "call_agent";

/// `call_agent` tool
///
/// Remote failures come back as `Error: ...` text so the model can react to them.
pub struct CallAgentTool {
    dispatcher: Arc<Dispatcher>,
    description: String,
}

impl CallAgentTool {
    /// Describe the agents currently registered
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        let mut description =
            String::from("Call another agent by exact name and return its final answer.");
        for agent in dispatcher.agents() {
            description.push_str(&format!("\n- {}: {}", agent.name, agent.description));
            if !agent.skills.is_empty() {
                description.push_str(&format!(" (skills: {})", agent.skills.join(", ")));
            }
        }

        Self {
            dispatcher,
            description,
        }
    }
}

#[async_trait]
impl Tool for CallAgentTool {
    fn name(&self) -> &str {
        CALL_AGENT_TOOL
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent_name": {"type": "string", "description": "Exact name of the agent"},
                "query": {"type": "string", "description": "Request for the agent"},
                "data": {"type": "object", "description": "Structured payload for the agent"},
                "file_path": {"type": "string", "description": "Local file to attach"},
                "context_id": {"type": "string", "description": "Conversation to continue"}
            },
            "required": ["agent_name", "query"]
        })
    }

    /// Continues the calling task's conversation unless the arguments name one
    async fn call(&self, input: Value, ctx: &ToolContext) -> anyhow::Result<String> {
        let mut request: CallRequest = serde_json::from_value(input)
            .map_err(|e| anyhow::anyhow!("Invalid call_agent arguments: {}", e))?;
        if request.context_id.is_none() && !ctx.context_id.is_empty() {
            request.context_id = Some(ctx.context_id.clone());
        }
        Ok(self.dispatcher.call_text(request).await)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use url::Url;

    use crate::{
        client::A2AClientBuilder,
        codec::JsonRpcResponse,
        protocol::{
            agent::{AgentCard, AgentSkill},
            event::{StreamEvent, TaskStatusUpdateEvent},
            message::Message,
            task::{TaskState, TaskStatus},
        },
        registry::{
            decision::AutoApprove,
            directory::{AgentRegistry, AgentScope, RegistryEntry},
        },
        transport::{mock::MockTransport, TransportResponse},
    };

    use super::*;

    fn tool(transport: MockTransport) -> CallAgentTool {
        let url: Url = "http://currency.local/".parse().unwrap();
        let entry = RegistryEntry {
            card: AgentCard::new("CurrencyExpert", "Converts money", url.as_str()).with_skill(
                AgentSkill::new("currency_conversion", "Currency conversion", "USD <-> VND"),
            ),
            client: A2AClientBuilder::new(url.clone())
                .with_transport(transport)
                .build()
                .unwrap(),
            url,
            scope: AgentScope::Public,
        };
        let dispatcher = Dispatcher::new(AgentRegistry::from_entries([entry]), AutoApprove);
        CallAgentTool::new(Arc::new(dispatcher))
    }

    #[test]
    fn test_description_lists_agents() {
        let tool = tool(MockTransport::ok());
        assert!(tool
            .description()
            .contains("- CurrencyExpert: Converts money (skills: Currency conversion)"));
        assert_eq!(tool.input_schema()["required"][1], "query");
    }

    #[tokio::test]
    async fn test_errors_become_text() {
        let transport = MockTransport::new(|_| TransportResponse::new(500).body(Bytes::new()));
        let tool = tool(transport.clone());

        let ctx = ToolContext::default();

        let unknown = tool
            .call(json!({"agent_name": "Nobody", "query": "hi"}), &ctx)
            .await
            .unwrap();
        assert_eq!(unknown, "Error: Agent not found: Nobody");
        assert_eq!(transport.call_count(), 0);

        assert!(tool.call(json!({"query": "missing agent"}), &ctx).await.is_err());
    }

    /// Replies with the context id the request arrived under
    fn context_echo() -> MockTransport {
        MockTransport::ok().with_stream(|req| {
            let body: Value = serde_json::from_slice(&req.body).unwrap();
            let ctx = body["params"]["message"]["contextId"].as_str().unwrap().to_string();
            let event = StreamEvent::StatusUpdate(TaskStatusUpdateEvent {
                task_id: "task-1".into(),
                context_id: ctx.clone(),
                status: TaskStatus::new(TaskState::Completed).with_message(Message::agent(ctx)),
                is_final: true,
            });
            let reply = JsonRpcResponse::success(json!(1), serde_json::to_value(event).unwrap());
            vec![format!("data: {}\n\n", serde_json::to_string(&reply).unwrap())]
        })
    }

    #[tokio::test]
    async fn test_call_continues_caller_context() {
        let tool = tool(context_echo());
        let ctx = ToolContext::new("host-task", "thread-7");

        let inherited = tool
            .call(json!({"agent_name": "CurrencyExpert", "query": "rate?"}), &ctx)
            .await
            .unwrap();
        assert_eq!(inherited, "thread-7");

        let explicit = tool
            .call(
                json!({"agent_name": "CurrencyExpert", "query": "rate?", "context_id": "other"}),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(explicit, "other");
    }
}
