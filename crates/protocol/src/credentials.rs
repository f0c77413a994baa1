use std::fmt::{self, Debug, Formatter};

use serde::{Deserialize, Serialize};

/// Credentials for a Dust workspace.
///
/// The value is immutable once a transport has been built from it.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    api_key: String,
    workspace_id: String,
}

impl Credentials {
    /// Creates credentials from an API key and a workspace id.
    #[inline]
    pub fn new<K: Into<String>, W: Into<String>>(
        api_key: K,
        workspace_id: W,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            workspace_id: workspace_id.into(),
        }
    }

    /// Returns the API key.
    #[inline]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns the workspace id.
    #[inline]
    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    /// Returns `true` if both fields are non-empty.
    #[inline]
    pub fn is_complete(&self) -> bool {
        !self.api_key.is_empty() && !self.workspace_id.is_empty()
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("workspace_id", &self.workspace_id)
            .finish()
    }
}
