use std::fmt::Debug;

use dust_ask_protocol::Credentials;

const DEFAULT_BASE_URL: &str = "https://dust.tt/api/v1/w";
const DEFAULT_TIMEZONE: &str = "Europe/Paris";
const DEFAULT_USERNAME: &str = "raycast";
const DEFAULT_FULL_NAME: &str = "Raycast";
const DEFAULT_PROFILE_PICTURE_URL: &str =
    "https://dust.tt/static/systemavatar/helper_avatar_full.png";
const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 64;

/// Builder for [`DustConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DustConfigBuilder {
    credentials: Credentials,
    base_url: Option<String>,
    timezone: Option<String>,
    username: Option<String>,
    full_name: Option<String>,
    profile_picture_url: Option<String>,
    event_queue_capacity: Option<usize>,
}

impl DustConfigBuilder {
    /// Creates a builder with the given credentials.
    #[inline]
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            credentials,
            base_url: None,
            timezone: None,
            username: None,
            full_name: None,
            profile_picture_url: None,
            event_queue_capacity: None,
        }
    }

    /// Sets a custom base URL (the part before the workspace id).
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the timezone sent in the message context.
    #[inline]
    pub fn with_timezone<S: Into<String>>(mut self, timezone: S) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    /// Sets the username sent in the message context.
    #[inline]
    pub fn with_username<S: Into<String>>(mut self, username: S) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the display name sent in the message context.
    #[inline]
    pub fn with_full_name<S: Into<String>>(mut self, full_name: S) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Sets the avatar URL sent in the message context.
    #[inline]
    pub fn with_profile_picture_url<S: Into<String>>(mut self, url: S) -> Self {
        self.profile_picture_url = Some(url.into());
        self
    }

    /// Sets how many decoded events may wait for the consumer before
    /// the stream reader pauses.
    #[inline]
    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = Some(capacity);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> DustConfig {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        DustConfig {
            base_url: base_url.trim_end_matches('/').to_owned(),
            credentials: self.credentials,
            timezone: self
                .timezone
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_owned()),
            username: self
                .username
                .unwrap_or_else(|| DEFAULT_USERNAME.to_owned()),
            full_name: self
                .full_name
                .unwrap_or_else(|| DEFAULT_FULL_NAME.to_owned()),
            profile_picture_url: self
                .profile_picture_url
                .unwrap_or_else(|| DEFAULT_PROFILE_PICTURE_URL.to_owned()),
            event_queue_capacity: self
                .event_queue_capacity
                .unwrap_or(DEFAULT_EVENT_QUEUE_CAPACITY),
        }
    }
}

impl Debug for DustConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DustConfigBuilder")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .field("timezone", &self.timezone)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Configuration for the Dust transport.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DustConfig {
    pub(crate) credentials: Credentials,
    pub(crate) base_url: String,
    pub(crate) timezone: String,
    pub(crate) username: String,
    pub(crate) full_name: String,
    pub(crate) profile_picture_url: String,
    pub(crate) event_queue_capacity: usize,
}

impl DustConfig {
    /// Returns the workspace id.
    #[inline]
    pub fn workspace_id(&self) -> &str {
        self.credentials.workspace_id()
    }

    pub(crate) fn conversations_url(&self) -> String {
        format!(
            "{}/{}/assistant/conversations",
            self.base_url,
            self.credentials.workspace_id()
        )
    }

    pub(crate) fn events_url(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> String {
        format!(
            "{}/{conversation_id}/messages/{message_id}/events",
            self.conversations_url()
        )
    }

    pub(crate) fn agents_url(&self) -> String {
        format!(
            "{}/{}/assistant/agent_configurations",
            self.base_url,
            self.credentials.workspace_id()
        )
    }

    #[inline]
    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.credentials.api_key())
    }
}
