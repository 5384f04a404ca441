//! Plugin identity and runtime settings.

use std::path::PathBuf;

/// Directory under which Scope discovers plugin sockets.
pub const PLUGINS_DIR: &str = "/var/run/scope/plugins";

/// Plugin ID used when none is configured.
pub const DEFAULT_PLUGIN_ID: &str = "scope-tc";

/// Static self-descriptor reported with every snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    pub id: String,
    pub label: String,
    pub description: String,
    pub interfaces: Vec<String>,
    pub api_version: String,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            id: DEFAULT_PLUGIN_ID.to_string(),
            label: "Traffic control".to_string(),
            description: "Adds traffic controls to the running Docker containers".to_string(),
            interfaces: vec!["reporter".to_string(), "controller".to_string()],
            api_version: "1".to_string(),
        }
    }
}

impl PluginConfig {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Socket path Scope expects for this plugin.
    ///
    /// The socket lives in its own sub-directory so the directory
    /// permissions control who can talk to the plugin.
    pub fn socket_path(&self) -> PathBuf {
        PathBuf::from(PLUGINS_DIR)
            .join(&self.id)
            .join(format!("{}.sock", self.id))
    }
}
