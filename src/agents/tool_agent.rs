//! Model-driven agent with tools and human-in-the-loop approval
//!
//! The executor keeps a [`Conversation`] per context in a [`CheckpointStore`]. Each
//! model step either answers, which completes the task, or requests tool calls. Calls
//! to tools listed in `interrupt_on` pause the task in `input-required`; the next
//! message in the same context carries the decisions and the loop picks up where it
//! stopped.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    protocol::{
        error::{A2AError, A2AResult},
        hitl::{ActionRequest, Decision, HitlRequest, InputEnvelope, ResumeCommand},
    },
    server::{
        retry, AgentExecutor, CheckpointStore, ExecutionContext, RetryPolicy, TaskUpdater,
    },
};

/// Task a tool call runs on behalf of
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolContext {
    pub task_id: String,

    /// Conversation of the calling task; delegated calls continue it by default
    pub context_id: String,
}

impl ToolContext {
    pub fn new(task_id: impl Into<String>, context_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            context_id: context_id.into(),
        }
    }
}

/// Callable tool
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    async fn call(&self, input: Value, ctx: &ToolContext) -> anyhow::Result<String>;
}

/// Tool description handed to the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// One entry of the conversation log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    User {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    Assistant {
        text: String,
    },
    ToolCall {
        call: ActionRequest,
    },
    ToolResult {
        name: String,
        output: String,
        #[serde(default)]
        is_error: bool,
    },
}

/// Conversation state persisted between turns and across interrupts
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub turns: Vec<Turn>,

    /// Tool calls waiting for a decision
    #[serde(default)]
    pub pending: Vec<ActionRequest>,
}

impl Conversation {
    /// Results of tool calls, oldest first
    pub fn tool_results(&self) -> impl Iterator<Item = (&str, &str, bool)> {
        self.turns.iter().filter_map(|turn| match turn {
            Turn::ToolResult {
                name,
                output,
                is_error,
            } => Some((name.as_str(), output.as_str(), *is_error)),
            _ => None,
        })
    }

    /// Text of the most recent user turn
    pub fn last_user_text(&self) -> Option<&str> {
        self.turns.iter().rev().find_map(|turn| match turn {
            Turn::User { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// What the model wants to do next
#[derive(Debug, Clone, PartialEq)]
pub enum ModelStep {
    Answer(String),
    ToolCalls(Vec<ActionRequest>),
}

/// Language model behind a [`ToolAgentExecutor`]
#[async_trait]
pub trait AgentModel: Send + Sync {
    async fn next_step(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> anyhow::Result<ModelStep>;
}

/// Executor running a model/tool loop with interrupts
pub struct ToolAgentExecutor {
    model: Arc<dyn AgentModel>,
    tools: HashMap<String, Arc<dyn Tool>>,
    interrupt_on: HashSet<String>,
    checkpoints: Arc<dyn CheckpointStore>,
    retry: RetryPolicy,
    max_steps: usize,
}

impl ToolAgentExecutor {
    pub fn new(model: impl AgentModel + 'static, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self {
            model: Arc::new(model),
            tools: HashMap::new(),
            interrupt_on: HashSet::new(),
            checkpoints,
            retry: RetryPolicy::default(),
            max_steps: 16,
        }
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
        self
    }

    /// Require a decision before calling `tool_name`
    pub fn interrupt_on(mut self, tool_name: impl Into<String>) -> Self {
        self.interrupt_on.insert(tool_name.into());
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Upper bound on model steps per execution
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<_> = self
            .tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    async fn load(&self, context_id: &str) -> A2AResult<Conversation> {
        match self.checkpoints.load(context_id).await? {
            Some(state) => Ok(serde_json::from_value(state)?),
            None => Ok(Conversation::default()),
        }
    }

    async fn save(&self, context_id: &str, conversation: &Conversation) -> A2AResult<()> {
        self.checkpoints
            .save(context_id, serde_json::to_value(conversation)?)
            .await
    }

    /// Apply decisions to the pending calls, in order
    async fn resume(
        &self,
        conversation: &mut Conversation,
        command: ResumeCommand,
        updater: &TaskUpdater,
    ) -> A2AResult<()> {
        if conversation.pending.is_empty() {
            return Err(A2AError::Validation(
                "No interrupted action is waiting for a decision".into(),
            ));
        }

        let request = HitlRequest {
            action_requests: conversation.pending.clone(),
        };
        command.validate_against(&request)?;

        let pending = std::mem::take(&mut conversation.pending);
        for (action, decision) in pending.into_iter().zip(command.decisions) {
            tracing::info!(
                task_id = %updater.task_id(),
                action = %action.name,
                decision = ?decision,
                "applying decision"
            );
            match decision {
                Decision::Approve => self.run_tool(conversation, &action, updater).await?,
                Decision::Edit { edited_action } => {
                    self.run_tool(conversation, &edited_action, updater).await?
                }
                Decision::Reject { message } => conversation.turns.push(Turn::ToolResult {
                    name: action.name,
                    output: format!("Rejected by reviewer: {}", message),
                    is_error: true,
                }),
            }
        }
        Ok(())
    }

    async fn run_tool(
        &self,
        conversation: &mut Conversation,
        call: &ActionRequest,
        updater: &TaskUpdater,
    ) -> A2AResult<()> {
        updater.start_work(format!("Running {}...", call.name)).await?;

        let (output, is_error) = match self.tools.get(&call.name) {
            None => (format!("Unknown tool: {}", call.name), true),
            Some(tool) => {
                let tool = tool.as_ref();
                let input = Value::Object(call.args.clone());
                let ctx = ToolContext::new(updater.task_id(), updater.context_id());
                let ctx = &ctx;
                match retry(self.retry, &call.name, move || tool.call(input.clone(), ctx)).await {
                    Ok(output) => (output, false),
                    Err(e) => (format!("Tool {} failed: {}", call.name, e), true),
                }
            }
        };

        conversation.turns.push(Turn::ToolResult {
            name: call.name.clone(),
            output,
            is_error,
        });
        Ok(())
    }

    /// Model loop until an answer, an interrupt or the step limit
    async fn drive(
        &self,
        conversation: &mut Conversation,
        context_id: &str,
        updater: &TaskUpdater,
    ) -> A2AResult<()> {
        let definitions = self.definitions();

        for _ in 0..self.max_steps {
            let current: &Conversation = conversation;
            let tools = definitions.as_slice();
            let step = retry(self.retry, "model", move || {
                self.model.next_step(current, tools)
            })
            .await
            .map_err(|e| A2AError::Other(format!("Model call failed: {}", e)))?;

            let calls = match step {
                ModelStep::Answer(text) => {
                    conversation.turns.push(Turn::Assistant { text: text.clone() });
                    self.save(context_id, conversation).await?;
                    return updater.complete(text).await;
                }
                ModelStep::ToolCalls(calls) if calls.is_empty() => {
                    return Err(A2AError::Other("Model requested an empty tool call list".into()));
                }
                ModelStep::ToolCalls(calls) => calls,
            };

            conversation
                .turns
                .extend(calls.iter().cloned().map(|call| Turn::ToolCall { call }));

            let (gated, direct): (Vec<_>, Vec<_>) = calls
                .into_iter()
                .partition(|call| self.interrupt_on.contains(&call.name));

            for call in &direct {
                self.run_tool(conversation, call, updater).await?;
            }

            if !gated.is_empty() {
                conversation.pending = gated.clone();
                self.save(context_id, conversation).await?;
                tracing::info!(
                    task_id = %updater.task_id(),
                    context_id,
                    actions = gated.len(),
                    "waiting for decisions"
                );
                return updater
                    .interrupt(&HitlRequest {
                        action_requests: gated,
                    })
                    .await;
            }

            self.save(context_id, conversation).await?;
        }

        tracing::warn!(task_id = %updater.task_id(), max_steps = self.max_steps, "step limit reached");
        updater
            .fail(format!(
                "Stopped after {} model steps without an answer",
                self.max_steps
            ))
            .await
    }
}

#[async_trait]
impl AgentExecutor for ToolAgentExecutor {
    async fn execute(&self, ctx: ExecutionContext, updater: TaskUpdater) -> A2AResult<()> {
        let envelope = ctx.envelope()?;
        let mut conversation = self.load(ctx.context_id()).await?;

        match envelope {
            Some(InputEnvelope::Command(command)) => {
                self.resume(&mut conversation, command, &updater).await?;
            }
            envelope => {
                if !conversation.pending.is_empty() {
                    tracing::info!(
                        task_id = %ctx.task_id(),
                        "new input replaces pending actions"
                    );
                    for action in std::mem::take(&mut conversation.pending) {
                        conversation.turns.push(Turn::ToolResult {
                            name: action.name,
                            output: "Skipped: the user sent a new message instead of a decision"
                                .into(),
                            is_error: true,
                        });
                    }
                }

                let data = match envelope {
                    Some(InputEnvelope::InputUser(data)) => Some(data),
                    _ => ctx.payload()?,
                };
                conversation.turns.push(Turn::User {
                    text: ctx.user_text(),
                    data,
                });
            }
        }

        self.drive(&mut conversation, ctx.context_id(), &updater)
            .await
    }
}
