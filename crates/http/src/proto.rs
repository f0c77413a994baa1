use serde::Serialize;

use crate::DustConfig;

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mention {
    configuration_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContext {
    timezone: String,
    username: String,
    email: Option<String>,
    full_name: String,
    profile_picture_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct NewMessage {
    content: String,
    mentions: Vec<Mention>,
    context: MessageContext,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CreateConversationRequest {
    visibility: &'static str,
    title: Option<String>,
    message: NewMessage,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_conversation_request(
    question: &str,
    agent_id: &str,
    config: &DustConfig,
) -> CreateConversationRequest {
    CreateConversationRequest {
        visibility: "unlisted",
        title: None,
        message: NewMessage {
            content: question.to_owned(),
            mentions: vec![Mention {
                configuration_id: agent_id.to_owned(),
            }],
            context: MessageContext {
                timezone: config.timezone.clone(),
                username: config.username.clone(),
                email: None,
                full_name: config.full_name.clone(),
                profile_picture_url: config.profile_picture_url.clone(),
            },
        },
    }
}
