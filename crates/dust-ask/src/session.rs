use dust_ask_core::protocol::{
    Credentials, DEFAULT_AGENT_ID, DEFAULT_AGENT_NAME,
};
use dust_ask_core::{AgentList, DirectoryError, Question};
use dust_ask_http::{DustClient, DustConfigBuilder};

use crate::Settings;

const APP_URL: &str = "https://dust.tt/w";

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    config_builder: DustConfigBuilder,
    settings: Settings,
}

impl SessionBuilder {
    /// Creates a session builder for a workspace, keeping local files in
    /// `settings`.
    pub fn with_credentials(
        credentials: Credentials,
        settings: Settings,
    ) -> Self {
        let config_builder = DustConfigBuilder::with_credentials(credentials);
        Self {
            config_builder,
            settings,
        }
    }

    /// Sets a custom API base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.config_builder = self.config_builder.with_base_url(base_url);
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        Session {
            client: DustClient::new(self.config_builder.build()),
            settings: self.settings,
        }
    }
}

/// A workspace session: the transport plus the local history and agent
/// cache.
#[derive(Clone, Debug)]
pub struct Session {
    client: DustClient,
    settings: Settings,
}

impl Session {
    /// Returns the transport.
    #[inline]
    pub fn client(&self) -> &DustClient {
        &self.client
    }

    /// Prepares a question to `agent_id`, recorded in history once
    /// answered.
    pub async fn question(&self, text: &str, agent_id: &str) -> Question {
        let question = Question::new(text)
            .with_agent(agent_id)
            .with_history(self.settings.history());
        match self.agent_name(agent_id).await {
            Some(name) => question.with_agent_name(name),
            None => question,
        }
    }

    /// Lists the active agents of the workspace.
    #[inline]
    pub async fn agents(&self) -> Result<AgentList, DirectoryError> {
        self.settings.agents().refresh(&self.client).await
    }

    /// Returns the web page to continue a conversation on.
    pub fn continue_url(&self, conversation_id: &str) -> String {
        format!(
            "{APP_URL}/{}/assistant/{conversation_id}",
            self.client.config().workspace_id()
        )
    }

    async fn agent_name(&self, agent_id: &str) -> Option<String> {
        if agent_id == DEFAULT_AGENT_ID {
            return Some(DEFAULT_AGENT_NAME.to_owned());
        }
        match self.settings.agents().cached().await {
            Ok(agents) => agents?.remove(agent_id).map(|agent| agent.name),
            Err(err) => {
                warn!("failed to read cached agents: {err}");
                None
            }
        }
    }
}
