//! A local fake transport for testing purpose.

mod preset;

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::sync::{Arc, Mutex};

use dust_ask_protocol::{
    AgentConfiguration, AgentMessage, Conversation, CreatedConversation,
    ErrorKind, EventStream, Message, Transport, TransportError, UserMessage,
    event_channel,
};
use tokio::time::sleep;

pub use preset::*;

#[derive(Clone, Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl TransportError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// A call received by [`TestTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    CreateConversation { question: String, agent_id: String },
    OpenEventStream {
        conversation_id: String,
        message_id: String,
    },
    ListAgents,
}

/// A local fake transport for testing purpose.
///
/// By default every question creates conversation `c1` holding user
/// message `u1` and agent reply `a1`, and the reply stream is empty.
/// Calls are recorded and can be inspected with [`requests`].
///
/// [`requests`]: TestTransport::requests
#[derive(Clone)]
pub struct TestTransport {
    conversation: Result<CreatedConversation, String>,
    stream: Option<PresetStream>,
    agents: Result<Vec<AgentConfiguration>, String>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl Default for TestTransport {
    fn default() -> Self {
        Self {
            conversation: Ok(conversation_with_replies("u1", &[("a1", "u1")])),
            stream: Some(PresetStream::default()),
            agents: Ok(vec![]),
            requests: Default::default(),
        }
    }
}

impl TestTransport {
    /// Creates a transport whose reply streams `stream`.
    #[inline]
    pub fn answering(stream: PresetStream) -> Self {
        Self {
            stream: Some(stream),
            ..Default::default()
        }
    }

    /// Makes conversation creation fail with `message`.
    #[inline]
    pub fn fail_creation<S: Into<String>>(mut self, message: S) -> Self {
        self.conversation = Err(message.into());
        self
    }

    /// Replaces the created conversation.
    #[inline]
    pub fn set_conversation(mut self, created: CreatedConversation) -> Self {
        self.conversation = Ok(created);
        self
    }

    /// Makes opening the event stream fail.
    #[inline]
    pub fn refuse_stream(mut self) -> Self {
        self.stream = None;
        self
    }

    /// Sets the agent directory.
    #[inline]
    pub fn set_agents(mut self, agents: Vec<AgentConfiguration>) -> Self {
        self.agents = Ok(agents);
        self
    }

    /// Makes listing agents fail with `message`.
    #[inline]
    pub fn fail_agents<S: Into<String>>(mut self, message: S) -> Self {
        self.agents = Err(message.into());
        self
    }

    /// Returns the calls received so far.
    pub fn requests(&self) -> Vec<Request> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns how many event streams were opened.
    pub fn stream_opens(&self) -> usize {
        self.requests()
            .iter()
            .filter(|req| matches!(req, Request::OpenEventStream { .. }))
            .count()
    }

    fn record(&self, request: Request) {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request),
            Err(poisoned) => poisoned.into_inner().push(request),
        }
    }
}

impl Transport for TestTransport {
    type Error = crate::Error;

    fn create_conversation(
        &self,
        question: &str,
        agent_id: &str,
    ) -> impl Future<Output = Result<CreatedConversation, Self::Error>>
    + Send
    + 'static {
        self.record(Request::CreateConversation {
            question: question.to_owned(),
            agent_id: agent_id.to_owned(),
        });
        let result = self.conversation.clone().map_err(|message| Error {
            message,
            kind: ErrorKind::Request,
        });
        ready(result)
    }

    fn open_event_stream(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> impl Future<Output = Option<EventStream>> + Send + 'static {
        self.record(Request::OpenEventStream {
            conversation_id: conversation_id.to_owned(),
            message_id: message_id.to_owned(),
        });
        let stream = self.stream.clone();

        async move {
            let preset = stream?;
            let (tx, events) = event_channel(1);
            tokio::spawn(async move {
                for preset_event in preset.events {
                    let delay = preset_event.delay();
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                    if !tx.send(preset_event.event).await {
                        break;
                    }
                }
            });
            Some(events)
        }
    }

    fn list_agents(
        &self,
    ) -> impl Future<Output = Result<Vec<AgentConfiguration>, Self::Error>>
    + Send
    + 'static {
        self.record(Request::ListAgents);
        let result = self.agents.clone().map_err(|message| Error {
            message,
            kind: ErrorKind::Status,
        });
        ready(result)
    }
}

/// Builds a created conversation `c1` with user message `user_id` and
/// the given `(reply_id, parent_id)` agent replies, in order.
pub fn conversation_with_replies(
    user_id: &str,
    replies: &[(&str, &str)],
) -> CreatedConversation {
    let user_message = UserMessage {
        id: user_id.to_owned(),
        content: "question".to_owned(),
        parent_message_id: None,
    };
    let mut content = vec![vec![Message::UserMessage(user_message.clone())]];
    for (reply_id, parent_id) in replies {
        content.push(vec![Message::AgentMessage(AgentMessage {
            id: (*reply_id).to_owned(),
            parent_message_id: Some((*parent_id).to_owned()),
            status: Some("created".to_owned()),
            content: None,
        })]);
    }
    CreatedConversation {
        conversation: Conversation {
            id: "c1".to_owned(),
            title: None,
            content,
        },
        user_message,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dust_ask_protocol::StreamEvent;
    use tokio::time::Instant;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timed_stream() {
        let transport = TestTransport::answering(
            PresetStream::with_timed_events([
                PresetEvent::now(StreamEvent::tokens("a")),
                PresetEvent::after(
                    Duration::from_millis(300),
                    StreamEvent::success("ab"),
                ),
            ]),
        );
        let created =
            transport.create_conversation("hi", "dust").await.unwrap();
        assert_eq!(created.conversation.id, "c1");

        let start = Instant::now();
        let mut events = transport.open_event_stream("c1", "a1").await.unwrap();
        assert_eq!(events.next_event().await, Some(StreamEvent::tokens("a")));
        assert_eq!(events.next_event().await, Some(StreamEvent::success("ab")));
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert_eq!(events.next_event().await, None);

        assert_eq!(
            transport.requests(),
            [
                Request::CreateConversation {
                    question: "hi".to_owned(),
                    agent_id: "dust".to_owned(),
                },
                Request::OpenEventStream {
                    conversation_id: "c1".to_owned(),
                    message_id: "a1".to_owned(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_failures() {
        let transport = TestTransport::default()
            .fail_creation("ECONNRESET")
            .fail_agents("forbidden")
            .refuse_stream();
        let err =
            transport.create_conversation("hi", "dust").await.unwrap_err();
        assert_eq!(err.to_string(), "ECONNRESET");
        assert_eq!(err.kind(), ErrorKind::Request);
        assert!(transport.open_event_stream("c1", "a1").await.is_none());
        assert!(transport.list_agents().await.is_err());
        assert_eq!(transport.stream_opens(), 1);
    }
}
