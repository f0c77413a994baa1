use serde::{Deserialize, Serialize};

/// The id of the agent questions are addressed to by default.
pub const DEFAULT_AGENT_ID: &str = "dust";

/// The display name of the default agent.
pub const DEFAULT_AGENT_NAME: &str = "Dust";

/// A configured agent in the workspace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfiguration {
    /// Stable agent id, used in mentions.
    #[serde(rename = "sId")]
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// Lifecycle status; only `active` agents can be asked.
    #[serde(default)]
    pub status: String,
    /// Icon URL.
    #[serde(default)]
    pub picture_url: Option<String>,
}

impl AgentConfiguration {
    /// Returns `true` if the agent can currently answer questions.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Response body of the agent directory endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfigurations {
    /// Every agent visible to the API key.
    pub agent_configurations: Vec<AgentConfiguration>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_deserialize_directory() {
        let value = json!({
            "agentConfigurations": [
                {
                    "sId": "gpt-4",
                    "name": "gpt4",
                    "description": "OpenAI's most capable model.",
                    "status": "active",
                    "pictureUrl": "https://example.com/gpt4.png",
                    "scope": "global"
                },
                {
                    "sId": "claude",
                    "name": "claude",
                    "status": "disabled_by_admin"
                }
            ]
        });
        let directory: AgentConfigurations =
            serde_json::from_value(value).unwrap();
        let agents = directory.agent_configurations;
        assert_eq!(agents.len(), 2);
        assert!(agents[0].is_active());
        assert!(!agents[1].is_active());
        assert_eq!(agents[1].description, "");
        assert_eq!(agents[1].picture_url, None);
    }
}
