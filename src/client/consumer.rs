//! Stream consumer turning task events into text chunks
//!
//! The consumer pulls one event at a time, so backpressure reaches the transport
//! as soon as the caller stops asking for chunks. It releases the event stream right
//! after the final chunk is handed out; later events are never read.

use std::{collections::VecDeque, time::Duration};

use futures::{Stream, StreamExt};

use crate::{
    protocol::{error::A2AError, event::StreamEvent, message::Part, task::TaskState},
    service::response::EventStream,
};

/// Which kind of event a chunk was extracted from
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkSource {
    Task,
    StatusUpdate,
    ArtifactUpdate {
        artifact_id: String,
        name: Option<String>,
    },
    Message,
}

/// One unit of text extracted from a task event
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Task the event belongs to, as last announced by the stream
    pub task_id: Option<String>,

    /// Context the event belongs to
    pub context_id: Option<String>,

    /// Event the text came from
    pub source: ChunkSource,

    /// Task state carried by the event (snapshots and status updates only)
    pub state: Option<TaskState>,

    /// Last chunk of the stream
    pub is_final: bool,

    pub text: String,
}

/// Pull-based consumer for one submitted message
///
/// Not restartable: once it returns `None` or an error, submit a new message.
pub struct StreamConsumer {
    events: Option<EventStream>,
    pending: VecDeque<Chunk>,
    idle_timeout: Option<Duration>,
    task_id: Option<String>,
    context_id: Option<String>,
    saw_final: bool,
    final_text: Option<String>,
}

impl StreamConsumer {
    pub fn new(events: EventStream) -> Self {
        Self {
            events: Some(events),
            pending: VecDeque::new(),
            idle_timeout: None,
            task_id: None,
            context_id: None,
            saw_final: false,
            final_text: None,
        }
    }

    /// Fail with `A2AError::Timeout` when no event arrives within `timeout`
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Whether the final chunk has been handed out
    pub fn saw_final(&self) -> bool {
        self.saw_final
    }

    /// Every text part of the final event, joined by newlines
    ///
    /// The final chunk itself only carries the last part.
    pub fn final_text(&self) -> Option<&str> {
        self.final_text.as_deref()
    }

    /// Task id announced by the stream so far
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    /// Next chunk, or `None` when the stream is exhausted
    ///
    /// A stream that ends without a final chunk simply returns `None`; callers decide
    /// whether that is a protocol violation via [`StreamConsumer::saw_final`].
    pub async fn next_chunk(&mut self) -> Option<Result<Chunk, A2AError>> {
        loop {
            if let Some(chunk) = self.pending.pop_front() {
                if chunk.is_final {
                    self.saw_final = true;
                    self.close();
                }
                return Some(Ok(chunk));
            }

            let events = self.events.as_mut()?;
            let next = match self.idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, events.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        tracing::warn!(task_id = ?self.task_id, "timed out waiting for the next event");
                        self.close();
                        return Some(Err(A2AError::Timeout));
                    }
                },
                None => events.next().await,
            };

            match next {
                None => {
                    self.close();
                    return None;
                }
                Some(Err(e)) => {
                    self.close();
                    return Some(Err(e));
                }
                Some(Ok(event)) => {
                    let chunks = self.chunks_for(event);
                    self.pending.extend(chunks);
                }
            }
        }
    }

    /// Adapt the consumer into a `Stream` of chunks
    pub fn into_stream(self) -> impl Stream<Item = Result<Chunk, A2AError>> + Send {
        futures::stream::unfold(self, |mut consumer| async move {
            consumer
                .next_chunk()
                .await
                .map(|chunk| (chunk, consumer))
        })
    }

    fn close(&mut self) {
        // Dropping the stream releases the transport connection.
        self.events = None;
        self.pending.clear();
    }

    fn chunks_for(&mut self, event: StreamEvent) -> Vec<Chunk> {
        if let Some(task_id) = event.task_id() {
            self.task_id = Some(task_id.to_string());
        }
        if let Some(context_id) = event.context_id() {
            self.context_id = Some(context_id.to_string());
        }

        let state = event.state();
        let is_final = event.is_final();

        let (source, texts): (ChunkSource, Vec<String>) = match event {
            StreamEvent::Task(task) => (
                ChunkSource::Task,
                task.status
                    .message
                    .map(|m| m.texts().map(str::to_string).collect())
                    .unwrap_or_default(),
            ),
            StreamEvent::StatusUpdate(update) => (
                ChunkSource::StatusUpdate,
                update
                    .status
                    .message
                    .map(|m| m.texts().map(str::to_string).collect())
                    .unwrap_or_default(),
            ),
            StreamEvent::ArtifactUpdate(update) => (
                ChunkSource::ArtifactUpdate {
                    artifact_id: update.artifact.artifact_id,
                    name: update.artifact.name,
                },
                update
                    .artifact
                    .parts
                    .iter()
                    .filter_map(Part::as_text)
                    .map(str::to_string)
                    .collect(),
            ),
            StreamEvent::Message(message) => (
                ChunkSource::Message,
                message.texts().map(str::to_string).collect(),
            ),
        };

        let mut texts = texts;
        if is_final && texts.is_empty() {
            tracing::warn!(
                task_id = ?self.task_id,
                state = ?state,
                "final event carried no text; yielding an empty final chunk"
            );
            texts.push(String::new());
        }
        if is_final {
            self.final_text = Some(texts.join("\n"));
        }

        let last = texts.len().saturating_sub(1);
        texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk {
                task_id: self.task_id.clone(),
                context_id: self.context_id.clone(),
                source: source.clone(),
                state,
                is_final: is_final && i == last,
                text,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::task::Poll;

    use crate::protocol::{
        event::{TaskArtifactUpdateEvent, TaskStatusUpdateEvent},
        message::{Message, Role},
        task::{Task, TaskStatus},
        Artifact,
    };

    use super::*;

    fn snapshot() -> StreamEvent {
        let mut task = Task::new("t1", "c1", Message::user("Convert"));
        task.status = TaskStatus::new(TaskState::Working);
        StreamEvent::Task(task)
    }

    fn status(state: TaskState, message: Option<Message>, is_final: bool) -> StreamEvent {
        let mut status = TaskStatus::new(state);
        status.message = message;
        StreamEvent::StatusUpdate(TaskStatusUpdateEvent {
            task_id: "t1".into(),
            context_id: "c1".into(),
            status,
            is_final,
        })
    }

    fn consumer(events: Vec<StreamEvent>) -> StreamConsumer {
        StreamConsumer::new(futures::stream::iter(events.into_iter().map(Ok)).boxed())
    }

    #[tokio::test]
    async fn test_chunks_in_order() {
        let artifact = StreamEvent::ArtifactUpdate(TaskArtifactUpdateEvent {
            task_id: "t1".into(),
            context_id: "c1".into(),
            artifact: Artifact::new("conversion-progress", vec![Part::text("Converting...")]),
            append: false,
            last_chunk: true,
        });

        let mut consumer = consumer(vec![
            snapshot(),
            status(TaskState::Working, Some(Message::agent("Processing...")), false),
            artifact,
            status(TaskState::Completed, Some(Message::agent("Done")), true),
        ]);

        let mut texts = Vec::new();
        while let Some(chunk) = consumer.next_chunk().await {
            let chunk = chunk.unwrap();
            assert_eq!(chunk.task_id.as_deref(), Some("t1"));
            texts.push((chunk.text, chunk.is_final));
        }

        assert_eq!(
            texts,
            vec![
                ("Processing...".to_string(), false),
                ("Converting...".to_string(), false),
                ("Done".to_string(), true),
            ]
        );
        assert!(consumer.saw_final());
    }

    #[tokio::test]
    async fn test_stops_after_final() {
        let events = futures::stream::iter(vec![
            Ok(snapshot()),
            Ok(status(TaskState::Canceled, Some(Message::agent("canceled")), true)),
        ])
        .chain(futures::stream::poll_fn(|_| -> Poll<Option<Result<StreamEvent, A2AError>>> {
            panic!("stream polled after the final event")
        }))
        .boxed();

        let mut consumer = StreamConsumer::new(events);
        let chunk = consumer.next_chunk().await.unwrap().unwrap();
        assert!(chunk.is_final);
        assert_eq!(chunk.state, Some(TaskState::Canceled));
        assert!(consumer.next_chunk().await.is_none());
    }

    #[tokio::test]
    async fn test_multi_part_final_marks_only_last() {
        let message = Message::new(Role::Agent, vec![Part::text("line one"), Part::text("line two")]);
        let mut consumer = consumer(vec![status(TaskState::Completed, Some(message), true)]);

        let first = consumer.next_chunk().await.unwrap().unwrap();
        let second = consumer.next_chunk().await.unwrap().unwrap();
        assert!(!first.is_final);
        assert!(second.is_final);
        assert_eq!(second.text, "line two");
        assert_eq!(consumer.final_text(), Some("line one\nline two"));
    }

    #[tokio::test]
    async fn test_final_without_message_yields_empty_final() {
        let mut consumer = consumer(vec![snapshot(), status(TaskState::Failed, None, true)]);

        assert_eq!(consumer.final_text(), None);
        let chunk = consumer.next_chunk().await.unwrap().unwrap();
        assert!(chunk.is_final);
        assert!(chunk.text.is_empty());
        assert_eq!(consumer.final_text(), Some(""));
        assert_eq!(chunk.state, Some(TaskState::Failed));
    }

    #[tokio::test]
    async fn test_stream_without_final() {
        let mut consumer = consumer(vec![
            snapshot(),
            status(TaskState::Working, Some(Message::agent("still going")), false),
        ]);

        assert!(!consumer.next_chunk().await.unwrap().unwrap().is_final);
        assert!(consumer.next_chunk().await.is_none());
        assert!(!consumer.saw_final());
    }

    #[test]
    fn test_pending_until_next_event() {
        let (tx, rx) = futures::channel::mpsc::unbounded();
        let mut consumer = StreamConsumer::new(rx.map(Ok::<_, A2AError>).boxed());

        let mut next = tokio_test::task::spawn(consumer.next_chunk());
        tokio_test::assert_pending!(next.poll());

        tx.unbounded_send(status(TaskState::Completed, Some(Message::agent("done")), true))
            .unwrap();
        assert!(next.is_woken());

        let chunk = tokio_test::assert_ready!(next.poll()).unwrap().unwrap();
        assert!(chunk.is_final);
        assert_eq!(chunk.text, "done");
    }

    #[tokio::test]
    async fn test_idle_timeout() {
        let events = futures::stream::pending::<Result<StreamEvent, A2AError>>().boxed();
        let mut consumer =
            StreamConsumer::new(events).with_idle_timeout(Duration::from_millis(20));

        assert!(matches!(
            consumer.next_chunk().await,
            Some(Err(A2AError::Timeout))
        ));
        assert!(consumer.next_chunk().await.is_none());
    }

    #[tokio::test]
    async fn test_into_stream() {
        let chunks: Vec<_> = consumer(vec![
            snapshot(),
            StreamEvent::Message(Message::agent("hello")),
            status(TaskState::Completed, Some(Message::agent("bye")), true),
        ])
        .into_stream()
        .collect()
        .await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_ref().unwrap().source, ChunkSource::Message);
    }
}
