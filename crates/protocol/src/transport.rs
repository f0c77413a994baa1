use std::error::Error;
use std::fmt::{self, Display};

use crate::{AgentConfiguration, CreatedConversation, EventStream};

/// The kind of transport failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request could not be sent or the connection broke.
    Request,
    /// The service answered with an unsuccessful status.
    Status,
    /// The response body could not be decoded.
    Decode,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Request => write!(f, "Request error"),
            ErrorKind::Status => write!(f, "Status error"),
            ErrorKind::Decode => write!(f, "Decode error"),
        }
    }
}

/// The error type for a transport.
pub trait TransportError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A connection to the conversation service.
///
/// Implementations perform exactly one outbound request per call and
/// never retry; a failed call is terminal for that attempt. Returned
/// futures own everything they need, so callers may drive them after
/// the borrowed arguments are gone.
pub trait Transport: Send + Sync {
    /// The error type that may be returned by the transport.
    type Error: TransportError;

    /// Creates a conversation whose first message is `question`,
    /// addressed to the agent `agent_id`.
    fn create_conversation(
        &self,
        question: &str,
        agent_id: &str,
    ) -> impl Future<Output = Result<CreatedConversation, Self::Error>>
    + Send
    + 'static;

    /// Opens the event stream of an agent message.
    ///
    /// Returns `None` if the stream cannot be opened. The failure is
    /// logged by the implementation and the caller should stop.
    fn open_event_stream(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> impl Future<Output = Option<EventStream>> + Send + 'static;

    /// Lists the agents configured in the workspace.
    fn list_agents(
        &self,
    ) -> impl Future<Output = Result<Vec<AgentConfiguration>, Self::Error>>
    + Send
    + 'static;
}
