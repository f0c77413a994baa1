use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An error reported by the service inside the event stream.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventError {
    /// A machine readable error code.
    pub code: String,
    /// A human readable message.
    pub message: String,
}

impl Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code: {} message: {}", self.code, self.message)
    }
}

/// An event from an agent message stream.
///
/// Kinds this client does not handle decode to [`StreamEvent::Unknown`]
/// instead of failing, so new server-side events never break a stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum StreamEvent {
    /// The user message could not be processed.
    UserMessageError {
        /// Creation time in milliseconds since the epoch.
        #[serde(default)]
        created: u64,
        /// The reported error.
        error: EventError,
    },
    /// The agent failed during an action or while generating.
    AgentError {
        /// Creation time in milliseconds since the epoch.
        #[serde(default)]
        created: u64,
        /// The agent configuration that failed.
        #[serde(default)]
        configuration_id: Option<String>,
        /// The agent message id.
        #[serde(default)]
        message_id: Option<String>,
        /// The reported error.
        error: EventError,
    },
    /// The agent finished running an action (search, tool, ...).
    AgentActionSuccess {
        /// Creation time in milliseconds since the epoch.
        #[serde(default)]
        created: u64,
        /// The agent configuration that ran the action.
        #[serde(default)]
        configuration_id: Option<String>,
        /// The agent message id.
        #[serde(default)]
        message_id: Option<String>,
        /// The action payload, kept opaque.
        #[serde(default)]
        action: Value,
    },
    /// A fragment of generated text.
    GenerationTokens {
        /// Creation time in milliseconds since the epoch.
        #[serde(default)]
        created: u64,
        /// The agent configuration that generated the text.
        #[serde(default)]
        configuration_id: Option<String>,
        /// The agent message id.
        #[serde(default)]
        message_id: Option<String>,
        /// The text fragment.
        text: String,
    },
    /// The agent finished generating the message.
    AgentGenerationSuccess {
        /// Creation time in milliseconds since the epoch.
        #[serde(default)]
        created: u64,
        /// The agent configuration that generated the text.
        #[serde(default)]
        configuration_id: Option<String>,
        /// The agent message id.
        #[serde(default)]
        message_id: Option<String>,
        /// The complete text of the message.
        text: String,
    },
    /// Any event kind this client does not know about.
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// Returns the wire name of this event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::UserMessageError { .. } => "user_message_error",
            StreamEvent::AgentError { .. } => "agent_error",
            StreamEvent::AgentActionSuccess { .. } => "agent_action_success",
            StreamEvent::GenerationTokens { .. } => "generation_tokens",
            StreamEvent::AgentGenerationSuccess { .. } => {
                "agent_generation_success"
            }
            StreamEvent::Unknown => "unknown",
        }
    }

    /// Creates a `generation_tokens` event with the given text.
    #[inline]
    pub fn tokens<S: Into<String>>(text: S) -> Self {
        StreamEvent::GenerationTokens {
            created: 0,
            configuration_id: None,
            message_id: None,
            text: text.into(),
        }
    }

    /// Creates an `agent_generation_success` event with the given text.
    #[inline]
    pub fn success<S: Into<String>>(text: S) -> Self {
        StreamEvent::AgentGenerationSuccess {
            created: 0,
            configuration_id: None,
            message_id: None,
            text: text.into(),
        }
    }

    /// Creates an `agent_error` event.
    #[inline]
    pub fn agent_error<C: Into<String>, M: Into<String>>(
        code: C,
        message: M,
    ) -> Self {
        StreamEvent::AgentError {
            created: 0,
            configuration_id: None,
            message_id: None,
            error: EventError {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

/// The JSON envelope carried in each SSE frame's `data` field.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct EventEnvelope {
    /// The server-side event id, if any.
    #[serde(default, rename = "eventId")]
    pub event_id: Option<String>,
    /// The actual event.
    pub data: StreamEvent,
}

impl EventEnvelope {
    /// Decodes an envelope from the data of an SSE frame.
    #[inline]
    pub fn decode(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}
