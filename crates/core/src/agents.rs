use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dust_ask_protocol::{AgentConfiguration, Transport};
use thiserror::Error;

use crate::store::{StoreError, read_json, write_json};

const AGENTS_FILE: &str = "agents.json";

/// Keeps the active agents of `agents`, keyed by id.
pub fn active_agents(
    agents: impl IntoIterator<Item = AgentConfiguration>,
) -> BTreeMap<String, AgentConfiguration> {
    agents
        .into_iter()
        .filter(AgentConfiguration::is_active)
        .map(|agent| (agent.id.clone(), agent))
        .collect()
}

/// An error from [`AgentDirectory`].
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The live directory could not be fetched and nothing was cached.
    #[error("failed to list agents: {0}")]
    Fetch(String),
    /// The cache could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Active agents, keyed by id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentList {
    /// The agents.
    pub agents: BTreeMap<String, AgentConfiguration>,
    /// Set when the live fetch failed and the list comes from the cache;
    /// holds the fetch error.
    pub stale: Option<String>,
}

impl AgentList {
    /// Returns the display name of an agent, if known.
    #[inline]
    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.agents.get(id).map(|agent| agent.name.as_str())
    }
}

/// The agents of a workspace, with a local cache of the last good list.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AgentDirectory {
    cache_path: PathBuf,
}

impl AgentDirectory {
    /// Creates a directory cached in the file at `path`.
    #[inline]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            cache_path: path.into(),
        }
    }

    /// Creates a directory cached in `agents.json` inside `dir`.
    #[inline]
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(dir.as_ref().join(AGENTS_FILE))
    }

    /// Fetches the live list and refreshes the cache.
    ///
    /// If the fetch fails, the cached list is returned instead and marked
    /// stale. A failure to write the cache is only logged.
    pub async fn refresh<T: Transport>(
        &self,
        transport: &T,
    ) -> Result<AgentList, DirectoryError> {
        match transport.list_agents().await {
            Ok(agents) => {
                let agents = active_agents(agents);
                debug!("fetched {} active agents", agents.len());
                if let Err(err) = write_json(&self.cache_path, &agents).await {
                    warn!("failed to cache agents: {err}");
                }
                Ok(AgentList {
                    agents,
                    stale: None,
                })
            }
            Err(err) => {
                error!("failed to list agents: {err}");
                match self.cached().await? {
                    Some(agents) => Ok(AgentList {
                        agents,
                        stale: Some(err.to_string()),
                    }),
                    None => Err(DirectoryError::Fetch(err.to_string())),
                }
            }
        }
    }

    /// Returns the cached list, if any.
    pub async fn cached(
        &self,
    ) -> Result<Option<BTreeMap<String, AgentConfiguration>>, StoreError> {
        read_json(&self.cache_path).await
    }
}

#[cfg(test)]
mod tests {
    use dust_ask_test_transport::TestTransport;

    use super::*;

    fn agent(id: &str, status: &str) -> AgentConfiguration {
        AgentConfiguration {
            id: id.to_owned(),
            name: id.to_uppercase(),
            description: String::new(),
            status: status.to_owned(),
            picture_url: None,
        }
    }

    #[test]
    fn test_active_agents() {
        let agents = active_agents([
            agent("gpt-4", "active"),
            agent("old", "archived"),
            agent("claude", "active"),
        ]);
        let ids: Vec<_> = agents.keys().map(String::as_str).collect();
        assert_eq!(ids, ["claude", "gpt-4"]);
    }

    #[tokio::test]
    async fn test_refresh_then_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let directory = AgentDirectory::in_dir(dir.path());

        let transport = TestTransport::default()
            .set_agents(vec![agent("dust", "active"), agent("x", "draft")]);
        let list = directory.refresh(&transport).await.unwrap();
        assert_eq!(list.stale, None);
        assert_eq!(list.name_of("dust"), Some("DUST"));
        assert_eq!(list.name_of("x"), None);

        let transport = TestTransport::default().fail_agents("forbidden");
        let list = directory.refresh(&transport).await.unwrap();
        assert_eq!(list.stale.as_deref(), Some("forbidden"));
        assert_eq!(list.agents.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_without_cache() {
        let dir = tempfile::tempdir().unwrap();
        let directory = AgentDirectory::in_dir(dir.path());
        let transport = TestTransport::default().fail_agents("offline");
        let err = directory.refresh(&transport).await.unwrap_err();
        assert_eq!(err.to_string(), "failed to list agents: offline");
    }
}
