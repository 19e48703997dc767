//! Editor configuration loaded from a TOML file.
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration:
//!
//! ```toml
//! [history]
//! max_undo = 100
//!
//! [log]
//! level = "info"
//!
//! [render]
//! task_budget_ms = 4
//! ```

use std::path::Path;
use std::time::Duration;

use levelforge_core::abstract_editor::DEFAULT_MAX_UNDO;
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub history: HistoryConfig,
    pub log: LogConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Bound of the undo stack; the oldest entries are dropped beyond it.
    pub max_undo: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_undo: DEFAULT_MAX_UNDO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `env_logger` filter used when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Time spent draining the render-task queue per tick.
    pub task_budget_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { task_budget_ms: 4 }
    }
}

impl RenderConfig {
    pub fn task_budget(&self) -> Duration {
        Duration::from_millis(self.task_budget_ms)
    }
}

impl EditorConfig {
    pub fn from_toml(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &content)
    }

    /// Loads a configuration file, falling back to defaults (with a warning)
    /// if it is missing or malformed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("{err}; using default configuration");
                Self::default()
            }
        }
    }
}
