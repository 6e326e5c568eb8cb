//! Assembles the client service stack

use std::{sync::Arc, time::Duration};

use tower::util::BoxCloneSyncService;
use tower_layer::Layer;
use url::Url;

use crate::{
    client::{AgentClient, ClientConfig},
    codec::{Codec, JsonRpcCodec},
    layer::{A2AValidationLayer, AuthCredentials, AuthLayer},
    protocol::error::A2AError,
    service::{A2AProtocolService, A2ARequest, A2AResponse},
    transport::{
        http::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT},
        HttpTransport, Transport,
    },
};

/// Type-erased client service stack
///
/// Every client built by [`A2AClientBuilder`] shares this type regardless of transport,
/// so clients for HTTP and in-process agents can sit in the same registry.
pub type A2AService = BoxCloneSyncService<A2ARequest, A2AResponse, A2AError>;

/// Builds an [`AgentClient`] for one agent URL
///
/// Layers wrap the protocol service from the inside out: validation first, then auth.
///
/// # Example
///
/// ```rust,no_run
/// use tower_a2a_dispatch::prelude::*;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let url = "https://agent.example.com".parse().unwrap();
/// let mut client = A2AClientBuilder::new_http(url)
///     .with_bearer_auth("token123".to_string())
///     .with_timeout(Duration::from_secs(60))
///     .build()?;
///
/// let agent_card = client.discover().await?;
/// println!("Connected to: {}", agent_card.name);
/// # Ok(())
/// # }
/// ```
pub struct A2AClientBuilder<T: Transport> {
    agent_url: Url,
    transport: Option<T>,
    codec: Option<Arc<dyn Codec>>,
    auth: Option<AuthCredentials>,
    connect_timeout: Duration,
    read_timeout: Duration,
    validate_responses: bool,
    extended_card_path: Option<String>,
}

impl<T: Transport> A2AClientBuilder<T> {
    /// Start a builder for an agent URL; a transport must be supplied
    pub fn new(agent_url: Url) -> Self {
        Self {
            agent_url,
            transport: None,
            codec: None,
            auth: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            validate_responses: true,
            extended_card_path: None,
        }
    }

    pub fn with_transport(mut self, transport: T) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Codec for the wire binding, JSON-RPC by default
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Send `Authorization: Bearer <token>` on every request
    pub fn with_bearer_auth(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(AuthCredentials::bearer(token));
        self
    }

    /// Send API key or basic credentials instead of a bearer token
    pub fn with_auth(mut self, credentials: AuthCredentials) -> Self {
        self.auth = Some(credentials);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bound every wait for response bytes, including the gap between two
    /// streamed events.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Check responses for protocol violations (on by default)
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_responses = enabled;
        self
    }

    /// Fetch the authenticated extended card from another path
    pub fn with_extended_card_path(mut self, path: impl Into<String>) -> Self {
        self.extended_card_path = Some(path.into());
        self
    }

    /// Fails without a transport, or when the transport rejects the timeouts
    pub fn build(self) -> Result<AgentClient<A2AService>, A2AError> {
        let transport = self.transport.ok_or_else(|| {
            A2AError::Config("Transport not configured. Call with_transport()".into())
        })?;
        let transport = transport.with_timeouts(self.connect_timeout, self.read_timeout)?;

        let codec = self
            .codec
            .unwrap_or_else(|| Arc::new(JsonRpcCodec::new()));

        let mut service = A2AService::new(A2AProtocolService::new(transport, codec));

        if self.validate_responses {
            service = A2AService::new(A2AValidationLayer::new().layer(service));
        }

        if let Some(auth) = self.auth {
            service = A2AService::new(AuthLayer::new(auth).layer(service));
        }

        let mut config = ClientConfig::new(self.agent_url)
            .with_connect_timeout(self.connect_timeout)
            .with_timeout(self.read_timeout)
            .with_validation(self.validate_responses);
        if let Some(path) = self.extended_card_path {
            config = config.with_extended_card_path(path);
        }

        Ok(AgentClient::new(service, config))
    }
}

impl A2AClientBuilder<HttpTransport> {
    /// HTTP transport with the JSON-RPC binding
    pub fn new_http(agent_url: Url) -> Self {
        let transport = HttpTransport::new(agent_url.clone());
        Self::new(agent_url).with_transport(transport)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        codec::JsonCodec,
        transport::{mock::MockTransport, TransportResponse},
    };

    use super::*;

    fn agent_url() -> Url {
        "https://example.com".parse().unwrap()
    }

    #[tokio::test]
    async fn test_auth_layer_reaches_transport() {
        let transport = MockTransport::new(|req| {
            assert_eq!(req.headers.get("X-API-Key").map(String::as_str), Some("k-1"));
            TransportResponse::new(500)
        });

        let mut client = A2AClientBuilder::new(agent_url())
            .with_transport(transport.clone())
            .with_auth(AuthCredentials::api_key("k-1", "X-API-Key"))
            .build()
            .unwrap();

        assert!(client.discover().await.is_err());
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_builder_without_transport() {
        let result = A2AClientBuilder::<MockTransport>::new(agent_url()).build();
        assert!(matches!(result, Err(A2AError::Config(_))));
    }

    #[test]
    fn test_builder_with_mock_transport() {
        let client = A2AClientBuilder::new(agent_url())
            .with_transport(MockTransport::ok())
            .with_codec(Arc::new(JsonCodec))
            .build();

        assert!(client.is_ok());
    }

    #[test]
    fn test_builder_all_options() {
        let client = A2AClientBuilder::new_http(agent_url())
            .with_bearer_auth("token")
            .with_connect_timeout(Duration::from_secs(5))
            .with_timeout(Duration::from_secs(45))
            .with_validation(true)
            .with_extended_card_path("/card/private")
            .build()
            .unwrap();

        assert_eq!(client.config().read_timeout, Duration::from_secs(45));
        assert_eq!(client.config().connect_timeout, Duration::from_secs(5));
        assert_eq!(client.config().extended_card_path, "/card/private");
    }
}
