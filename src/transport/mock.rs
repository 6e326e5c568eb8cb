use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use url::Url;

use crate::{
    protocol::error::A2AError,
    transport::{ByteStream, Transport, TransportRequest, TransportResponse},
};

type UnaryHandler = Arc<dyn Fn(TransportRequest) -> TransportResponse + Send + Sync>;
type StreamHandler = Arc<dyn Fn(TransportRequest) -> Vec<String> + Send + Sync>;

/// Mock transport for internal testing
///
/// Unary requests are answered by a closure; streaming requests replay scripted SSE
/// body chunks. Every request increments a shared counter so tests can assert that
/// no I/O was attempted.
#[derive(Clone)]
pub(crate) struct MockTransport {
    handler: UnaryHandler,
    stream_handler: Option<StreamHandler>,
    calls: Arc<AtomicUsize>,
    base_url: Url,
}

impl MockTransport {
    /// Create a new mock transport with a custom request handler
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(TransportRequest) -> TransportResponse + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            stream_handler: None,
            calls: Arc::new(AtomicUsize::new(0)),
            base_url: Url::parse("http://mock.local/").unwrap(),
        }
    }

    /// Create a mock transport that always returns 200 OK
    pub fn ok() -> Self {
        Self::new(|_| TransportResponse::new(200))
    }

    /// Answer streaming requests with the given raw SSE chunks
    pub fn with_stream<F>(mut self, handler: F) -> Self
    where
        F: Fn(TransportRequest) -> Vec<String> + Send + Sync + 'static,
    {
        self.stream_handler = Some(Arc::new(handler));
        self
    }

    /// Number of requests executed so far, across clones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), A2AError>> {
        Poll::Ready(Ok(()))
    }

    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, A2AError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((self.handler)(request))
    }

    async fn execute_streaming(&self, request: TransportRequest) -> Result<ByteStream, A2AError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let handler = self
            .stream_handler
            .as_ref()
            .ok_or_else(|| A2AError::Transport("mock has no stream handler".into()))?;

        let chunks = handler(request)
            .into_iter()
            .map(|c| Ok(Bytes::from(c)))
            .collect::<Vec<_>>();
        Ok(futures::stream::iter(chunks).boxed())
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("calls", &self.call_count())
            .finish()
    }
}
