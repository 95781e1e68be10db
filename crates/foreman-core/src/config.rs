//! Engine configuration loaded from `foreman-config.yaml`.
//!
//! The file is optional section by section: every field defaults through a
//! named function, so a partial file (or none at all) yields the documented
//! defaults. The task-layer sections ([`EngineSettings`]) are flattened into
//! the top level of the YAML document.

use std::path::Path;

use serde::{Deserialize, Serialize};

use foreman_tasks::EngineSettings;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration. Persisted with the engine snapshot so a
/// restore runs with the settings it was saved under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Render each robot's state text above its head.
    #[serde(default = "default_show_robot_state")]
    pub show_robot_state: bool,

    /// Task-layer settings (debug, robot, scan, pathfinder sections).
    #[serde(flatten)]
    pub settings: EngineSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            show_robot_state: default_show_robot_state(),
            settings: EngineSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::parse(&contents)?)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }
}

const fn default_show_robot_state() -> bool {
    true
}
