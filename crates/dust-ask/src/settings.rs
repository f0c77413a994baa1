use std::env;
use std::path::{Path, PathBuf};

use dust_ask_core::protocol::Credentials;
use dust_ask_core::{
    AgentDirectory, HistoryStore, StoreError, read_json, write_json,
};

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "DUST_API_KEY";

/// Environment variable holding the workspace id.
pub const WORKSPACE_VAR: &str = "DUST_WORKSPACE_ID";

const APP_DIR: &str = "dust-ask";
const CREDENTIALS_FILE: &str = "credentials.json";

/// Where the CLI keeps its files.
#[derive(Clone, Debug)]
pub struct Settings {
    dir: PathBuf,
    history: HistoryStore,
}

impl Settings {
    /// Uses `dir` as the settings directory.
    #[inline]
    pub fn in_dir<P: Into<PathBuf>>(dir: P) -> Self {
        let dir = dir.into();
        let history = HistoryStore::in_dir(&dir);
        Self { dir, history }
    }

    /// Uses the per-user config directory of the platform.
    ///
    /// Returns `None` if the platform has no such directory.
    pub fn locate() -> Option<Self> {
        dirs::config_dir().map(|dir| Self::in_dir(dir.join(APP_DIR)))
    }

    /// Returns the settings directory.
    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the credentials to use, from the environment if both
    /// variables are set, from the credentials file otherwise.
    ///
    /// Incomplete credentials count as missing.
    pub async fn credentials(&self) -> Result<Option<Credentials>, StoreError> {
        let from_env = credentials_from(|name| env::var(name).ok());
        if let Some(credentials) = from_env {
            debug!("using credentials from the environment");
            return Ok(Some(credentials));
        }
        let credentials: Option<Credentials> =
            read_json(&self.credentials_path()).await?;
        Ok(credentials.filter(Credentials::is_complete))
    }

    /// Saves credentials to the credentials file.
    pub async fn save_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<(), StoreError> {
        write_json(&self.credentials_path(), credentials).await
    }

    /// Returns the history store, shared by every clone of these
    /// settings.
    #[inline]
    pub fn history(&self) -> HistoryStore {
        self.history.clone()
    }

    /// Returns the agent directory.
    #[inline]
    pub fn agents(&self) -> AgentDirectory {
        AgentDirectory::in_dir(&self.dir)
    }

    #[inline]
    fn credentials_path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }
}

fn credentials_from(
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<Credentials> {
    let credentials =
        Credentials::new(lookup(API_KEY_VAR)?, lookup(WORKSPACE_VAR)?);
    credentials.is_complete().then_some(credentials)
}
