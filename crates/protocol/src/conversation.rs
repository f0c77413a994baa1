use serde::{Deserialize, Serialize};

/// A conversation as returned by the service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// The conversation id.
    #[serde(rename = "sId")]
    pub id: String,
    /// The title of the conversation, if the service generated one.
    #[serde(default)]
    pub title: Option<String>,
    /// Message slots in conversation order. Each slot keeps every
    /// version of the message, the last one being the current one.
    #[serde(default)]
    pub content: Vec<Vec<Message>>,
}

impl Conversation {
    /// Iterates over the latest version of every message slot.
    pub fn latest_messages(&self) -> impl Iterator<Item = &Message> {
        self.content.iter().filter_map(|versions| versions.last())
    }

    /// Finds the agent reply to the given user message.
    ///
    /// Only the latest version of each slot is considered. If several
    /// agent messages point at the same parent, the first one in
    /// conversation order is returned.
    pub fn find_agent_reply(
        &self,
        user_message: &UserMessage,
    ) -> Option<&AgentMessage> {
        self.latest_messages().find_map(|msg| match msg {
            Message::AgentMessage(agent_msg)
                if agent_msg.parent_message_id.as_deref()
                    == Some(user_message.id.as_str()) =>
            {
                Some(agent_msg)
            }
            _ => None,
        })
    }
}

/// A message in a conversation slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// A message written by the user.
    UserMessage(UserMessage),
    /// A message produced by an agent.
    AgentMessage(AgentMessage),
    /// Any other kind of message, such as content fragments.
    #[serde(other)]
    Other,
}

/// The user message created for a submitted question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessage {
    /// The message id.
    #[serde(rename = "sId")]
    pub id: String,
    /// The question text.
    #[serde(default)]
    pub content: String,
    /// User messages are roots, so this is normally absent.
    #[serde(default)]
    pub parent_message_id: Option<String>,
}

/// A reply produced by an agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessage {
    /// The message id.
    #[serde(rename = "sId")]
    pub id: String,
    /// The id of the user message this replies to.
    #[serde(default)]
    pub parent_message_id: Option<String>,
    /// Generation status reported by the service (`created`,
    /// `succeeded`, `failed`, ...).
    #[serde(default)]
    pub status: Option<String>,
    /// Text generated so far; usually empty on a fresh conversation.
    #[serde(default)]
    pub content: Option<String>,
}

/// Result of creating a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedConversation {
    /// The new conversation.
    pub conversation: Conversation,
    /// The user message holding the question.
    #[serde(rename = "message")]
    pub user_message: UserMessage,
}
