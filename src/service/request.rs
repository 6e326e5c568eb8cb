//! Requests flowing through the client Tower stack

use crate::{codec::JsonRpcCodec, layer::auth::AuthCredentials, protocol::operation::A2AOperation};

/// One operation addressed to one agent
#[derive(Debug, Clone)]
pub struct A2ARequest {
    pub operation: A2AOperation,
    pub context: RequestContext,
}

impl A2ARequest {
    pub fn new(operation: A2AOperation, context: RequestContext) -> Self {
        Self { operation, context }
    }

    /// JSON-RPC method or discovery path, for logs
    pub fn describe(&self) -> String {
        if self.operation.is_discovery() {
            self.operation.endpoint()
        } else {
            JsonRpcCodec::operation_to_method(&self.operation).to_string()
        }
    }
}

/// Per-call settings filled in by the client and its layers
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Base URL of the target agent
    pub agent_url: String,

    /// Set by `AuthLayer` unless the caller supplied its own
    pub auth: Option<AuthCredentials>,
}

impl RequestContext {
    pub fn new(agent_url: impl Into<String>) -> Self {
        Self {
            agent_url: agent_url.into(),
            ..Self::default()
        }
    }

    pub fn with_auth(mut self, auth: AuthCredentials) -> Self {
        self.auth = Some(auth);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::Message;

    #[test]
    fn test_describe() {
        let stream = A2ARequest::new(
            A2AOperation::SendMessage {
                message: Message::user("Convert"),
                stream: true,
            },
            RequestContext::new("http://currency.local/"),
        );
        assert_eq!(stream.describe(), "message/stream");

        let discover = A2ARequest::new(A2AOperation::DiscoverAgent, RequestContext::default());
        assert_eq!(discover.describe(), "/.well-known/agent-card.json");
    }

    #[test]
    fn test_context_builders() {
        let context =
            RequestContext::new("http://currency.local/").with_auth(AuthCredentials::bearer("t"));

        assert_eq!(context.agent_url, "http://currency.local/");
        assert_eq!(context.auth.unwrap().bearer_token(), Some("t"));
    }
}
