use std::fmt::{self, Debug};
use std::time::Duration;

use chrono::Utc;
use dust_ask_protocol::{
    DEFAULT_AGENT_ID, DEFAULT_AGENT_NAME, ErrorKind, Transport, TransportError,
};
use thiserror::Error;
use tokio::time::Instant;
use tracing::Instrument;

use crate::answer::{AnswerAggregator, DEFAULT_THROTTLE, Outcome, ProtocolError};
use crate::history::{HistoryEntry, HistoryStore};

/// Why a question produced no answer.
#[derive(Debug, Error)]
pub enum AskError {
    /// The conversation could not be created.
    #[error("{message}")]
    Create {
        /// The kind of transport failure.
        kind: ErrorKind,
        /// The underlying failure message.
        message: String,
    },
    /// The created conversation holds no reply to the question.
    #[error("no agent reply to {user_message_id} in {conversation_id}")]
    ReplyNotFound {
        /// The created conversation.
        conversation_id: String,
        /// The user message holding the question.
        user_message_id: String,
    },
    /// The event stream of the reply could not be opened.
    #[error("could not open the event stream of message {message_id}")]
    StreamUnavailable {
        /// The created conversation.
        conversation_id: String,
        /// The agent reply.
        message_id: String,
    },
    /// The service reported an error in the stream.
    #[error("{error}")]
    Protocol {
        /// The created conversation.
        conversation_id: String,
        /// The reported error.
        error: ProtocolError,
    },
    /// The stream ended without a final answer.
    #[error("the event stream ended before the answer was complete")]
    Incomplete {
        /// The created conversation.
        conversation_id: String,
        /// The answer accumulated before the stream ended.
        partial: String,
    },
}

impl AskError {
    /// Returns the conversation the failure happened in, if one was
    /// created.
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            AskError::Create { .. } => None,
            AskError::ReplyNotFound {
                conversation_id, ..
            }
            | AskError::StreamUnavailable {
                conversation_id, ..
            }
            | AskError::Protocol {
                conversation_id, ..
            }
            | AskError::Incomplete {
                conversation_id, ..
            } => Some(conversation_id),
        }
    }
}

/// A successfully answered question.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Answer {
    /// The conversation holding the exchange.
    pub conversation_id: String,
    /// The final answer text.
    pub text: String,
}

type ConversationFn = Box<dyn FnOnce(&str) + Send>;
type AnswerFn = Box<dyn FnMut(&str) + Send>;
type DoneFn = Box<dyn FnOnce(&str) + Send>;

/// A question to submit to an agent.
///
/// Asking creates a conversation, follows the agent reply stream and
/// reports the answer through the attached callbacks:
///
/// - `on_conversation` once the conversation exists;
/// - `on_answer` with the whole answer so far, at most once per
///   throttle interval, and with the final answer;
/// - `on_done` with the final answer, once, only on success.
///
/// The returned future resolves when the stream reaches a terminal
/// state or ends. Submitting the same question again while a previous
/// `ask` is still running creates a second conversation; callers have
/// to guard against that themselves.
pub struct Question {
    text: String,
    agent_id: String,
    agent_name: Option<String>,
    throttle: Duration,
    history: Option<HistoryStore>,
    on_conversation: Option<ConversationFn>,
    on_answer: Option<AnswerFn>,
    on_done: Option<DoneFn>,
}

impl Question {
    /// Creates a question for the default agent.
    #[inline]
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            agent_id: DEFAULT_AGENT_ID.to_owned(),
            agent_name: None,
            throttle: DEFAULT_THROTTLE,
            history: None,
            on_conversation: None,
            on_answer: None,
            on_done: None,
        }
    }

    /// Addresses the question to another agent.
    #[inline]
    pub fn with_agent<S: Into<String>>(mut self, agent_id: S) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    /// Sets the agent name recorded in history.
    #[inline]
    pub fn with_agent_name<S: Into<String>>(mut self, name: S) -> Self {
        self.agent_name = Some(name.into());
        self
    }

    /// Sets the minimum interval between partial answers.
    #[inline]
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Records the exchange in `history` once answered.
    #[inline]
    pub fn with_history(mut self, history: HistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    /// Attaches a callback to be invoked with the conversation id.
    #[inline]
    pub fn on_conversation(
        mut self,
        on_conversation: impl FnOnce(&str) + Send + 'static,
    ) -> Self {
        self.on_conversation = Some(Box::new(on_conversation));
        self
    }

    /// Attaches a callback to be invoked with the answer so far.
    #[inline]
    pub fn on_answer(
        mut self,
        on_answer: impl FnMut(&str) + Send + 'static,
    ) -> Self {
        self.on_answer = Some(Box::new(on_answer));
        self
    }

    /// Attaches a callback to be invoked with the final answer.
    #[inline]
    pub fn on_done(
        mut self,
        on_done: impl FnOnce(&str) + Send + 'static,
    ) -> Self {
        self.on_done = Some(Box::new(on_done));
        self
    }

    /// Submits the question through `transport` and streams the answer.
    pub async fn ask<T: Transport>(
        self,
        transport: &T,
    ) -> Result<Answer, AskError> {
        let span = trace_span!("question", agent = %self.agent_id);
        self.run(transport).instrument(span).await
    }

    async fn run<T: Transport>(
        mut self,
        transport: &T,
    ) -> Result<Answer, AskError> {
        let created = match transport
            .create_conversation(&self.text, &self.agent_id)
            .await
        {
            Ok(created) => created,
            Err(err) => {
                error!("failed to create conversation: {err}");
                return Err(AskError::Create {
                    kind: err.kind(),
                    message: err.to_string(),
                });
            }
        };
        let conversation_id = created.conversation.id.clone();
        debug!("created conversation {conversation_id}");
        if let Some(on_conversation) = self.on_conversation.take() {
            on_conversation(&conversation_id);
        }

        let Some(reply) =
            created.conversation.find_agent_reply(&created.user_message)
        else {
            error!("failed to retrieve agent message in {conversation_id}");
            return Err(AskError::ReplyNotFound {
                conversation_id,
                user_message_id: created.user_message.id,
            });
        };
        let message_id = reply.id.clone();

        let Some(mut events) = transport
            .open_event_stream(&conversation_id, &message_id)
            .await
        else {
            return Err(AskError::StreamUnavailable {
                conversation_id,
                message_id,
            });
        };

        trace!("start receiving events of {message_id}");

        let mut aggregator = AnswerAggregator::with_throttle(self.throttle);
        while let Some(event) = events.next_event().await {
            match aggregator.handle_event(&event, Instant::now()) {
                Outcome::Ignored | Outcome::Buffered => {}
                Outcome::Partial(text) => self.emit(&text),
                Outcome::Succeeded(text) => {
                    self.emit(&text);
                    if let Some(history) = &self.history {
                        let entry =
                            self.history_entry(&conversation_id, &text);
                        if let Err(err) = history.append(entry).await {
                            error!("failed to record history: {err}");
                        }
                    }
                    if let Some(on_done) = self.on_done.take() {
                        on_done(&text);
                    }
                    return Ok(Answer {
                        conversation_id,
                        text,
                    });
                }
                Outcome::Failed(error) => {
                    return Err(AskError::Protocol {
                        conversation_id,
                        error,
                    });
                }
            }
        }

        warn!("event stream of {message_id} ended without a final answer");
        Err(AskError::Incomplete {
            conversation_id,
            partial: aggregator.text().into_owned(),
        })
    }

    #[inline]
    fn emit(&mut self, text: &str) {
        if let Some(on_answer) = &mut self.on_answer {
            on_answer(text);
        }
    }

    fn history_entry(
        &self,
        conversation_id: &str,
        answer: &str,
    ) -> HistoryEntry {
        let agent = match &self.agent_name {
            Some(name) => name.clone(),
            None if self.agent_id == DEFAULT_AGENT_ID => {
                DEFAULT_AGENT_NAME.to_owned()
            }
            None => self.agent_id.clone(),
        };
        HistoryEntry {
            conversation_id: conversation_id.to_owned(),
            question: self.text.clone(),
            answer: answer.to_owned(),
            date: Utc::now(),
            agent,
        }
    }
}

impl Debug for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Question")
            .field("text", &self.text)
            .field("agent_id", &self.agent_id)
            .field("throttle", &self.throttle)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use dust_ask_protocol::StreamEvent;
    use dust_ask_test_transport::{
        PresetEvent, PresetStream, Request, TestTransport,
        conversation_with_replies,
    };

    use super::*;

    #[derive(Clone, Default)]
    struct Recorder {
        answers: Arc<Mutex<Vec<String>>>,
        done: Arc<Mutex<Vec<String>>>,
        conversations: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn attach(&self, question: Question) -> Question {
            let answers = Arc::clone(&self.answers);
            let done = Arc::clone(&self.done);
            let conversations = Arc::clone(&self.conversations);
            question
                .on_answer(move |text| {
                    answers.lock().unwrap().push(text.to_owned());
                })
                .on_done(move |text| done.lock().unwrap().push(text.to_owned()))
                .on_conversation(move |id| {
                    conversations.lock().unwrap().push(id.to_owned());
                })
        }

        fn answers(&self) -> Vec<String> {
            self.answers.lock().unwrap().clone()
        }

        fn done(&self) -> Vec<String> {
            self.done.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn test_answer_scenario() {
        let transport = TestTransport::answering(PresetStream::with_events([
            StreamEvent::tokens("4"),
            StreamEvent::success("4."),
        ]));
        let recorder = Recorder::default();
        let answer = recorder
            .attach(Question::new("2+2?"))
            .ask(&transport)
            .await
            .unwrap();

        assert_eq!(answer.text, "4.");
        assert_eq!(answer.conversation_id, "c1");
        assert_eq!(recorder.answers(), ["4", "4."]);
        assert_eq!(recorder.done(), ["4."]);
        assert_eq!(*recorder.conversations.lock().unwrap(), ["c1"]);
        assert_eq!(
            transport.requests(),
            [
                Request::CreateConversation {
                    question: "2+2?".to_owned(),
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
    async fn test_creation_failure() {
        let transport = TestTransport::default().fail_creation("ECONNRESET");
        let recorder = Recorder::default();
        let err = recorder
            .attach(Question::new("2+2?").with_agent("gpt-4"))
            .ask(&transport)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "ECONNRESET");
        assert!(matches!(err, AskError::Create { .. }));
        assert_eq!(err.conversation_id(), None);
        assert_eq!(transport.stream_opens(), 0);
        assert!(recorder.answers().is_empty());
        assert!(recorder.conversations.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_partials() {
        let millis = Duration::from_millis;
        let transport =
            TestTransport::answering(PresetStream::with_timed_events([
                PresetEvent::now(StreamEvent::tokens("a")),
                PresetEvent::after(millis(100), StreamEvent::tokens("b")),
                PresetEvent::after(millis(500), StreamEvent::tokens("c")),
                PresetEvent::after(millis(100), StreamEvent::tokens("d")),
                PresetEvent::after(millis(100), StreamEvent::success("abcd!")),
            ]));
        let recorder = Recorder::default();
        recorder
            .attach(Question::new("letters"))
            .ask(&transport)
            .await
            .unwrap();
        assert_eq!(recorder.answers(), ["a", "abc", "abcd!"]);
        assert_eq!(recorder.done(), ["abcd!"]);
    }

    #[tokio::test]
    async fn test_protocol_error_stops_consumption() {
        let transport = TestTransport::answering(PresetStream::with_events([
            StreamEvent::tokens("par"),
            StreamEvent::agent_error("model_error", "overloaded"),
            StreamEvent::tokens("tial"),
            StreamEvent::success("partial"),
        ]));
        let recorder = Recorder::default();
        let err = recorder
            .attach(Question::new("q").with_throttle(Duration::ZERO))
            .ask(&transport)
            .await
            .unwrap_err();

        let AskError::Protocol { error, .. } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(error.error.code, "model_error");
        assert_eq!(recorder.answers(), ["par"]);
        assert!(recorder.done().is_empty());
    }

    #[tokio::test]
    async fn test_stream_end_without_answer() {
        let transport = TestTransport::answering(PresetStream::with_events([
            StreamEvent::tokens("half "),
            StreamEvent::tokens("done"),
        ]));
        let recorder = Recorder::default();
        let err = recorder
            .attach(Question::new("q"))
            .ask(&transport)
            .await
            .unwrap_err();

        let AskError::Incomplete { partial, .. } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(partial, "half done");
        assert_eq!(recorder.answers(), ["half "]);
        assert!(recorder.done().is_empty());
    }

    #[tokio::test]
    async fn test_reply_not_found() {
        let transport = TestTransport::default()
            .set_conversation(conversation_with_replies("u1", &[("a2", "u9")]));
        let err = Question::new("q").ask(&transport).await.unwrap_err();
        assert!(matches!(err, AskError::ReplyNotFound { .. }));
        assert_eq!(err.conversation_id(), Some("c1"));
        assert_eq!(transport.stream_opens(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_replies_use_first() {
        let transport = TestTransport::answering(PresetStream::with_events([
            StreamEvent::success("ok"),
        ]))
        .set_conversation(conversation_with_replies(
            "u1",
            &[("a9", "u0"), ("a1", "u1"), ("a2", "u1")],
        ));
        Question::new("q").ask(&transport).await.unwrap();
        assert_eq!(
            transport.requests()[1],
            Request::OpenEventStream {
                conversation_id: "c1".to_owned(),
                message_id: "a1".to_owned(),
            }
        );
    }

    #[tokio::test]
    async fn test_stream_unavailable() {
        let transport = TestTransport::default().refuse_stream();
        let recorder = Recorder::default();
        let err = recorder
            .attach(Question::new("q"))
            .ask(&transport)
            .await
            .unwrap_err();
        assert!(matches!(err, AskError::StreamUnavailable { .. }));
        // The conversation was still reported.
        assert_eq!(*recorder.conversations.lock().unwrap(), ["c1"]);
        assert!(recorder.answers().is_empty());
    }

    #[tokio::test]
    async fn test_records_history() {
        let dir = tempfile::tempdir().unwrap();
        let history = HistoryStore::in_dir(dir.path());
        let transport = TestTransport::answering(PresetStream::with_events([
            StreamEvent::success("Paris:cite[w1]"),
        ]));
        Question::new("Capital of France?")
            .with_agent("geo")
            .with_agent_name("Geographer")
            .with_history(history.clone())
            .ask(&transport)
            .await
            .unwrap();

        let entries = history.load().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].conversation_id, "c1");
        assert_eq!(entries[0].question, "Capital of France?");
        assert_eq!(entries[0].answer, "Paris");
        assert_eq!(entries[0].agent, "Geographer");

        // Failed questions are not recorded.
        let transport = TestTransport::answering(PresetStream::with_events([
            StreamEvent::agent_error("e", "m"),
        ]));
        Question::new("again")
            .with_history(history.clone())
            .ask(&transport)
            .await
            .unwrap_err();
        assert_eq!(history.load().await.unwrap().len(), 1);
    }
}
