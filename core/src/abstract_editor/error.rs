//! Edit context error type.

use std::fmt;

/// Recoverable failures reported by [`EditContext`](super::EditContext).
///
/// Invariant violations (reentrant rebuilds, stale recreated views) are not
/// represented here; they panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    /// The undo stack is empty.
    NothingToUndo,
    /// The redo stack is empty.
    NothingToRedo,
    /// A key does not resolve to a live data object.
    UnknownObject(String),
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NothingToUndo => write!(f, "nothing to undo"),
            Self::NothingToRedo => write!(f, "nothing to redo"),
            Self::UnknownObject(key) => write!(f, "unknown object: {key}"),
        }
    }
}

impl std::error::Error for EditError {}

/// Result type for edit context operations.
pub type EditResult<T = ()> = Result<T, EditError>;
