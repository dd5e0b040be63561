//! Configuration for opening a [`ModelDB`](super::ModelDB).

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::constants::COLLABORATORS_MAP;

/// Settings of one open document.
///
/// Every field has a default, so a partial JSON object is accepted:
///
/// ```
/// use cosync::ModelDbConfig;
///
/// let config = ModelDbConfig::from_json(r#"{"path": "notebooks/intro.ipynb"}"#).unwrap();
/// assert_eq!(config.path, "notebooks/intro.ipynb");
/// assert_eq!(config.presence_key, "collaborators:map");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDbConfig {
    /// File path the realtime document is attached to
    pub path: String,

    /// Prefix applied to every path passed to the store
    pub base_path: String,

    /// Root key of the collaborator presence map
    pub presence_key: String,
}

impl Default for ModelDbConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            base_path: String::new(),
            presence_key: COLLABORATORS_MAP.to_string(),
        }
    }
}

impl ModelDbConfig {
    /// Configuration for the document at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_presence_key(mut self, presence_key: impl Into<String>) -> Self {
        self.presence_key = presence_key.into();
        self
    }

    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
