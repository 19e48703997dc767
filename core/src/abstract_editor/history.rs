//! Undo/redo history.
//!
//! [`UndoHistory`] manages a linear undo/redo stack of [`HistoryEntry`]
//! values. When a new entry is pushed after undoing, the redo stack is
//! cleared (standard editor behavior).

use std::collections::VecDeque;
use std::fmt;

use super::command::{Command, HistoryEntry};

/// Default maximum number of undo steps.
pub const DEFAULT_MAX_UNDO: usize = 100;

/// Manages an undo/redo stack of commands.
///
/// The undo stack is a bounded [`VecDeque`]: when it exceeds `max_undo`,
/// the oldest entry is dropped from the front. The redo stack is an
/// unbounded [`Vec`] (it can never grow larger than the undo stack was).
///
/// Undoing pops the top entry, [reverts](Command::revert) it and pushes the
/// returned inverse onto the redo stack; redoing mirrors this.
///
/// # Example
///
/// ```ignore
/// let mut history = UndoHistory::new(50);
///
/// // The caller mutated the model, then records the change
/// history.add_to_undo(command);
///
/// history.undo(&mut model);
/// history.redo(&mut model);
/// ```
pub struct UndoHistory<C: Command> {
    undo_stack: VecDeque<HistoryEntry<C>>,
    redo_stack: Vec<HistoryEntry<C>>,
    max_undo: usize,
    /// Tracks distance from the saved state.
    ///
    /// - `Some(0)`: the current state matches the last save.
    /// - `Some(n)` where `n > 0`: `n` undos needed to reach the saved state.
    /// - `Some(n)` where `n < 0`: `|n|` redos needed to reach the saved state.
    /// - `None`: the save point is permanently unreachable (capacity overflow
    ///   dropped it, or the redo branch holding it was discarded).
    save_distance: Option<i64>,
}

impl<C: Command> UndoHistory<C> {
    /// Creates an empty history with the given maximum undo depth.
    pub fn new(max_undo: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_undo,
            save_distance: Some(0),
        }
    }

    /// Records a single command as a new undo entry and clears the redo stack.
    pub fn add_to_undo(&mut self, command: C) {
        self.push(HistoryEntry::Single(command));
    }

    /// Records several commands as one undo entry named `name`.
    ///
    /// The commands must be given in the order they were applied.
    pub fn add_batch_to_undo(&mut self, commands: Vec<C>, name: impl Into<String>) {
        self.push(HistoryEntry::Batch {
            name: name.into(),
            commands,
        });
    }

    fn push(&mut self, entry: HistoryEntry<C>) {
        // Clearing the redo stack invalidates a save point that was in redo.
        self.redo_stack.clear();
        if let Some(d) = self.save_distance {
            if d < 0 {
                self.save_distance = None;
            }
        }
        if let Some(d) = &mut self.save_distance {
            *d += 1;
        }
        self.undo_stack.push_back(entry);
        self.enforce_capacity();
    }

    fn enforce_capacity(&mut self) {
        while self.undo_stack.len() > self.max_undo {
            self.undo_stack.pop_front();
            // If the save point was beyond the oldest surviving entry, it's gone.
            if let Some(d) = self.save_distance {
                if d > self.undo_stack.len() as i64 {
                    self.save_distance = None;
                }
            }
        }
    }

    /// Reverts the most recent entry. Returns `false` if there was nothing to undo.
    pub fn undo(&mut self, model: &mut C::Model) -> bool {
        let Some(entry) = self.undo_stack.pop_back() else {
            return false;
        };
        log::debug!("Undo: {}", entry.name());
        self.redo_stack.push(entry.revert(model));
        if let Some(d) = &mut self.save_distance {
            *d -= 1;
        }
        true
    }

    /// Re-applies the most recently undone entry. Returns `false` if there
    /// was nothing to redo.
    pub fn redo(&mut self, model: &mut C::Model) -> bool {
        let Some(entry) = self.redo_stack.pop() else {
            return false;
        };
        log::debug!("Redo: {}", entry.name());
        self.undo_stack.push_back(entry.revert(model));
        if let Some(d) = &mut self.save_distance {
            *d += 1;
        }
        self.enforce_capacity();
        true
    }

    /// Returns `true` if there are entries that can be undone.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Returns `true` if there are entries that can be redone.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Undo entries, most recent first.
    pub fn undo_stack(&self) -> impl Iterator<Item = &HistoryEntry<C>> {
        self.undo_stack.iter().rev()
    }

    /// Redo entries, most recent first (the next one to redo comes first).
    pub fn redo_stack(&self) -> impl Iterator<Item = &HistoryEntry<C>> {
        self.redo_stack.iter().rev()
    }

    /// Returns an iterator over undo entry names, most recent first.
    pub fn undo_names(&self) -> impl Iterator<Item = &str> {
        self.undo_stack().map(|e| e.name())
    }

    /// Returns an iterator over redo entry names, most recent first.
    pub fn redo_names(&self) -> impl Iterator<Item = &str> {
        self.redo_stack().map(|e| e.name())
    }

    /// Returns the number of entries in the undo stack.
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Returns the number of entries in the redo stack.
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Returns the maximum undo depth.
    pub fn max_undo(&self) -> usize {
        self.max_undo
    }

    /// Records the current state as the saved state.
    ///
    /// After calling this, [`has_unsaved_changes`](Self::has_unsaved_changes)
    /// returns `false` until the history is modified by a push, undo, or redo.
    pub fn mark_saved(&mut self) {
        self.save_distance = Some(0);
    }

    /// Returns `true` if the current state differs from the last saved state.
    pub fn has_unsaved_changes(&self) -> bool {
        self.save_distance != Some(0)
    }

    /// Clears both stacks.
    ///
    /// If the current state was the saved state it remains so; otherwise the
    /// save point is permanently lost.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        if self.save_distance != Some(0) {
            self.save_distance = None;
        }
    }
}

impl<C: Command> fmt::Debug for UndoHistory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoHistory")
            .field("undo_count", &self.undo_stack.len())
            .field("redo_count", &self.redo_stack.len())
            .field("max_undo", &self.max_undo)
            .field("save_distance", &self.save_distance)
            .finish()
    }
}
