use std::fmt;
use std::path::PathBuf;

use crate::level::{ActorId, GroupId, RailId, RailPointId};

/// Errors raised by course edits that reference something that is not there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelError {
    /// No actor with this id exists in the course.
    ActorNotFound(ActorId),
    /// No rail with this id exists in the course.
    RailNotFound(RailId),
    /// No rail contains a point with this id.
    RailPointNotFound(RailPointId),
    /// No group with this id exists in the course.
    GroupNotFound(GroupId),
    /// An insertion index past the end of a list.
    InvalidIndex { index: usize, len: usize },
}

impl fmt::Display for LevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelError::ActorNotFound(id) => write!(f, "actor not found: {id}"),
            LevelError::RailNotFound(id) => write!(f, "rail not found: {id}"),
            LevelError::RailPointNotFound(id) => write!(f, "rail point not found: {id}"),
            LevelError::GroupNotFound(id) => write!(f, "group not found: {id}"),
            LevelError::InvalidIndex { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
        }
    }
}

impl std::error::Error for LevelError {}

/// Errors that can occur while loading the editor configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file is not valid configuration TOML.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_missing_object() {
        let err = LevelError::ActorNotFound(ActorId::new(7));
        assert_eq!(err.to_string(), "actor not found: actor#7");

        let err = LevelError::InvalidIndex { index: 4, len: 2 };
        assert_eq!(err.to_string(), "index 4 out of range for length 2");
    }

    #[test]
    fn io_error_is_chained() {
        use std::error::Error;

        let err = ConfigError::Io {
            path: PathBuf::from("missing.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("failed to read missing.toml"));
    }
}
