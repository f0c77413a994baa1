use std::borrow::Cow;
use std::fmt::{self, Display};
use std::time::Duration;

use dust_ask_protocol::{EventError, StreamEvent};
use tokio::time::Instant;

use crate::citation::strip_citations;

/// The minimum interval between two partial answers.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(500);

/// Lifecycle of an answer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AnswerState {
    /// No event has been consumed yet.
    #[default]
    Idle,
    /// Events are being folded into the answer.
    Streaming,
    /// The final answer has been produced.
    Succeeded,
    /// The service reported an error.
    Failed,
}

impl AnswerState {
    /// Returns `true` for `Succeeded` and `Failed`.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, AnswerState::Succeeded | AnswerState::Failed)
    }
}

/// An error reported by the service inside the event stream.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProtocolError {
    /// The event kind that carried the error.
    pub kind: &'static str,
    /// The reported error.
    pub error: EventError,
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.kind)
    }
}

/// What the caller should do after an event has been handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The event does not affect the answer.
    Ignored,
    /// Text was appended but the throttle holds it back for now.
    Buffered,
    /// A partial answer to surface.
    Partial(String),
    /// The final answer.
    Succeeded(String),
    /// The reply failed; nothing more will be produced.
    Failed(ProtocolError),
}

/// Folds stream events into an answer.
///
/// Generated fragments are accumulated as received and surfaced at most
/// once per throttle interval, with citation markers removed. The first
/// fragment is surfaced immediately. Once a terminal event has been
/// handled, every further event is ignored.
#[derive(Clone, Debug)]
pub struct AnswerAggregator {
    state: AnswerState,
    raw: String,
    throttle: Duration,
    last_emission: Option<Instant>,
}

impl Default for AnswerAggregator {
    #[inline]
    fn default() -> Self {
        Self::with_throttle(DEFAULT_THROTTLE)
    }
}

impl AnswerAggregator {
    /// Creates an aggregator with the default throttle.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an aggregator with a custom throttle interval.
    #[inline]
    pub fn with_throttle(throttle: Duration) -> Self {
        Self {
            state: AnswerState::Idle,
            raw: String::new(),
            throttle,
            last_emission: None,
        }
    }

    /// Returns the current state.
    #[inline]
    pub fn state(&self) -> AnswerState {
        self.state
    }

    /// Returns the answer accumulated so far, citations removed.
    #[inline]
    pub fn text(&self) -> Cow<'_, str> {
        strip_citations(&self.raw)
    }

    /// Handles one event received at `now`.
    pub fn handle_event(
        &mut self,
        event: &StreamEvent,
        now: Instant,
    ) -> Outcome {
        if self.state.is_terminal() {
            trace!("ignoring {} after completion", event.kind());
            return Outcome::Ignored;
        }
        self.state = AnswerState::Streaming;

        match event {
            StreamEvent::UserMessageError { error, .. } => {
                error!("User message error: {error}");
                self.fail(event.kind(), error)
            }
            StreamEvent::AgentError { error, .. } => {
                error!("Agent message error: {error}");
                self.fail(event.kind(), error)
            }
            StreamEvent::GenerationTokens { text, .. } => {
                self.raw.push_str(text);
                if let Some(last) = self.last_emission {
                    if now.saturating_duration_since(last) < self.throttle {
                        return Outcome::Buffered;
                    }
                }
                self.last_emission = Some(now);
                Outcome::Partial(self.text().into_owned())
            }
            StreamEvent::AgentGenerationSuccess { text, .. } => {
                self.raw = strip_citations(text).into_owned();
                self.last_emission = Some(now);
                self.state = AnswerState::Succeeded;
                Outcome::Succeeded(self.raw.clone())
            }
            StreamEvent::AgentActionSuccess { .. } | StreamEvent::Unknown => {
                trace!("ignoring {}", event.kind());
                Outcome::Ignored
            }
        }
    }

    #[inline]
    fn fail(&mut self, kind: &'static str, error: &EventError) -> Outcome {
        self.state = AnswerState::Failed;
        Outcome::Failed(ProtocolError {
            kind,
            error: error.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(start: Instant, millis: u64) -> Instant {
        start + Duration::from_millis(millis)
    }

    #[test]
    fn test_accumulates_in_order() {
        let start = Instant::now();
        // A zero throttle surfaces every fragment.
        let mut aggregator = AnswerAggregator::with_throttle(Duration::ZERO);
        let mut last = Outcome::Ignored;
        for text in ["The ", "answer ", "is ", "4"] {
            last = aggregator.handle_event(&StreamEvent::tokens(text), start);
        }
        assert_eq!(last, Outcome::Partial("The answer is 4".to_owned()));
        assert_eq!(aggregator.text(), "The answer is 4");
        assert_eq!(aggregator.state(), AnswerState::Streaming);
    }

    #[test]
    fn test_throttle() {
        let start = Instant::now();
        let mut aggregator = AnswerAggregator::new();
        let outcomes: Vec<_> = [(0, "a"), (100, "b"), (600, "c"), (700, "d")]
            .into_iter()
            .map(|(millis, text)| {
                aggregator
                    .handle_event(&StreamEvent::tokens(text), at(start, millis))
            })
            .collect();
        assert_eq!(
            outcomes,
            [
                Outcome::Partial("a".to_owned()),
                Outcome::Buffered,
                Outcome::Partial("abc".to_owned()),
                Outcome::Buffered,
            ]
        );
        // Nothing is lost while buffered.
        assert_eq!(aggregator.text(), "abcd");
    }

    #[test]
    fn test_throttle_boundary() {
        let start = Instant::now();
        let mut aggregator = AnswerAggregator::new();
        aggregator.handle_event(&StreamEvent::tokens("a"), start);
        assert_eq!(
            aggregator.handle_event(&StreamEvent::tokens("b"), at(start, 499)),
            Outcome::Buffered
        );
        assert_eq!(
            aggregator.handle_event(&StreamEvent::tokens("c"), at(start, 500)),
            Outcome::Partial("abc".to_owned())
        );
    }

    #[test]
    fn test_citations_split_across_fragments() {
        let start = Instant::now();
        let mut aggregator = AnswerAggregator::with_throttle(Duration::ZERO);
        aggregator.handle_event(&StreamEvent::tokens("Paris:ci"), start);
        let outcome = aggregator
            .handle_event(&StreamEvent::tokens("te[x1] is nice"), start);
        assert_eq!(outcome, Outcome::Partial("Paris is nice".to_owned()));
    }

    #[test]
    fn test_success_replaces_accumulator() {
        let start = Instant::now();
        let mut aggregator = AnswerAggregator::new();
        aggregator.handle_event(&StreamEvent::tokens("4"), start);
        let outcome = aggregator.handle_event(
            &StreamEvent::success("4.:cite[calc]"),
            at(start, 10),
        );
        assert_eq!(outcome, Outcome::Succeeded("4.".to_owned()));
        assert_eq!(aggregator.state(), AnswerState::Succeeded);
        assert_eq!(aggregator.text(), "4.");
    }

    #[test]
    fn test_terminal_exclusivity() {
        let start = Instant::now();
        let mut aggregator = AnswerAggregator::new();
        aggregator.handle_event(&StreamEvent::success("done"), start);
        for event in [
            StreamEvent::tokens("more"),
            StreamEvent::success("again"),
            StreamEvent::agent_error("late", "error"),
        ] {
            assert_eq!(
                aggregator.handle_event(&event, at(start, 1000)),
                Outcome::Ignored
            );
        }
        assert_eq!(aggregator.text(), "done");

        let mut aggregator = AnswerAggregator::new();
        let error = StreamEvent::agent_error("model", "overloaded");
        let outcome = aggregator.handle_event(&error, start);
        let Outcome::Failed(err) = outcome else {
            panic!("expected a failure");
        };
        assert_eq!(err.kind, "agent_error");
        assert_eq!(err.error.code, "model");
        assert_eq!(aggregator.state(), AnswerState::Failed);
        assert_eq!(
            aggregator.handle_event(&StreamEvent::success("x"), start),
            Outcome::Ignored
        );
    }

    #[test]
    fn test_user_message_error() {
        let mut aggregator = AnswerAggregator::new();
        let event = StreamEvent::UserMessageError {
            created: 1,
            error: EventError {
                code: "quota".to_owned(),
                message: "limit reached".to_owned(),
            },
        };
        let outcome = aggregator.handle_event(&event, Instant::now());
        let Outcome::Failed(err) = outcome else {
            panic!("expected a failure");
        };
        assert_eq!(err.kind, "user_message_error");
        assert_eq!(
            err.to_string(),
            "code: quota message: limit reached (user_message_error)"
        );
    }

    #[test]
    fn test_ignored_events() {
        let mut aggregator = AnswerAggregator::new();
        let now = Instant::now();
        assert_eq!(
            aggregator.handle_event(&StreamEvent::Unknown, now),
            Outcome::Ignored
        );
        let action = StreamEvent::AgentActionSuccess {
            created: 1,
            configuration_id: None,
            message_id: None,
            action: Default::default(),
        };
        assert_eq!(aggregator.handle_event(&action, now), Outcome::Ignored);
        assert_eq!(aggregator.text(), "");
        assert!(!aggregator.state().is_terminal());
    }
}
