//! Decision sources answering interrupt requests

use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout},
    sync::Mutex,
};

use crate::protocol::{
    error::{A2AError, A2AResult},
    hitl::{ActionRequest, Decision, HitlRequest},
};

/// Produces one decision per pending action, in order
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DecisionSource: Send + Sync {
    async fn resolve(&self, request: &HitlRequest) -> A2AResult<Vec<Decision>>;
}

/// Approves every action
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl DecisionSource for AutoApprove {
    async fn resolve(&self, request: &HitlRequest) -> A2AResult<Vec<Decision>> {
        Ok(vec![Decision::Approve; request.action_requests.len()])
    }
}

/// Replays pre-seeded decision rounds
///
/// Each interrupt consumes one round. Running out of rounds is an error.
#[derive(Debug, Default)]
pub struct ScriptedDecisions {
    rounds: Mutex<VecDeque<Vec<Decision>>>,
}

impl ScriptedDecisions {
    pub fn new(rounds: impl IntoIterator<Item = Vec<Decision>>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into_iter().collect()),
        }
    }

    /// Rounds not yet consumed
    pub async fn remaining(&self) -> usize {
        self.rounds.lock().await.len()
    }
}

#[async_trait]
impl DecisionSource for ScriptedDecisions {
    async fn resolve(&self, _request: &HitlRequest) -> A2AResult<Vec<Decision>> {
        self.rounds
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| A2AError::Other("No scripted decisions left".into()))
    }
}

struct Console<R, W> {
    reader: R,
    writer: W,
}

/// Interactive decisions on a line-based console
///
/// For every action the operator types `approve`, `reject` or `edit`. Rejections ask
/// for a reason; edits ask for each argument, keeping the current value on an empty
/// line. Values that parse as JSON are used as JSON, anything else as a string.
pub struct ConsoleDecisionSource<R, W> {
    console: Mutex<Console<R, W>>,
}

impl<R, W> ConsoleDecisionSource<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            console: Mutex::new(Console { reader, writer }),
        }
    }
}

impl ConsoleDecisionSource<BufReader<Stdin>, Stdout> {
    /// Prompt on stdout, read from stdin
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn ask(&mut self, prompt: &str) -> A2AResult<String> {
        let io_error = |e: std::io::Error| A2AError::Other(format!("Console error: {}", e));

        self.writer.write_all(prompt.as_bytes()).await.map_err(io_error)?;
        self.writer.flush().await.map_err(io_error)?;

        let mut line = String::new();
        let read = self.reader.read_line(&mut line).await.map_err(io_error)?;
        if read == 0 {
            return Err(A2AError::Other("Decision input closed".into()));
        }
        Ok(line.trim().to_string())
    }

    async fn decide(&mut self, action: &ActionRequest) -> A2AResult<Decision> {
        let args = serde_json::to_string(&action.args)?;
        let header = format!("\nAction: {} {}\n", action.name, args);

        self.writer
            .write_all(header.as_bytes())
            .await
            .map_err(|e| A2AError::Other(format!("Console error: {}", e)))?;

        loop {
            let choice = self.ask("Decision (approve / reject / edit): ").await?;
            match choice.to_lowercase().as_str() {
                "approve" | "a" => return Ok(Decision::Approve),
                "reject" | "r" => {
                    let message = self.ask("Reject reason: ").await?;
                    return Ok(Decision::Reject { message });
                }
                "edit" | "e" => {
                    let mut edited = Map::new();
                    for (key, current) in &action.args {
                        let answer = self
                            .ask(&format!("{} (default={}): ", key, current))
                            .await?;
                        let value = if answer.is_empty() {
                            current.clone()
                        } else {
                            serde_json::from_str(&answer).unwrap_or(Value::String(answer))
                        };
                        edited.insert(key.clone(), value);
                    }
                    return Ok(Decision::Edit {
                        edited_action: ActionRequest::new(action.name.clone(), edited),
                    });
                }
                _ => continue,
            }
        }
    }
}

#[async_trait]
impl<R, W> DecisionSource for ConsoleDecisionSource<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn resolve(&self, request: &HitlRequest) -> A2AResult<Vec<Decision>> {
        let mut console = self.console.lock().await;
        let mut decisions = Vec::with_capacity(request.action_requests.len());
        for action in &request.action_requests {
            decisions.push(console.decide(action).await?);
        }
        Ok(decisions)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request() -> HitlRequest {
        let mut args = Map::new();
        args.insert("path".into(), json!("/tmp/a.txt"));
        args.insert("force".into(), json!(false));
        HitlRequest {
            action_requests: vec![
                ActionRequest::new("delete_file", args.clone()),
                ActionRequest::new("delete_file", args.clone()),
                ActionRequest::new("delete_file", args),
            ],
        }
    }

    #[tokio::test]
    async fn test_auto_approve() {
        let decisions = AutoApprove.resolve(&request()).await.unwrap();
        assert_eq!(decisions, vec![Decision::Approve; 3]);
    }

    #[tokio::test]
    async fn test_scripted_rounds() {
        let source = ScriptedDecisions::new([vec![Decision::Approve]]);

        assert_eq!(source.resolve(&request()).await.unwrap(), vec![Decision::Approve]);
        assert_eq!(source.remaining().await, 0);
        assert!(source.resolve(&request()).await.is_err());
    }

    #[tokio::test]
    async fn test_console_decisions() {
        // Map keys iterate in sorted order: force, then path.
        let input = "maybe\napprove\nreject\ntoo risky\nedit\ntrue\n\n";
        let mut output = Vec::new();
        let source = ConsoleDecisionSource::new(input.as_bytes(), &mut output);

        let decisions = source.resolve(&request()).await.unwrap();

        assert_eq!(decisions[0], Decision::Approve);
        assert_eq!(
            decisions[1],
            Decision::Reject {
                message: "too risky".into()
            }
        );
        match &decisions[2] {
            Decision::Edit { edited_action } => {
                assert_eq!(edited_action.args["force"], json!(true));
                assert_eq!(edited_action.args["path"], json!("/tmp/a.txt"));
            }
            other => panic!("expected edit, got {:?}", other),
        }

        drop(source);
        let prompts = String::from_utf8(output).unwrap();
        assert!(prompts.contains("Action: delete_file"));
        assert!(prompts.contains("path (default=\"/tmp/a.txt\")"));
    }

    #[tokio::test]
    async fn test_console_closed_input() {
        let source = ConsoleDecisionSource::new(&b""[..], tokio::io::sink());
        assert!(source.resolve(&request()).await.is_err());
    }
}
