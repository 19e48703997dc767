//! Reversible commands.
//!
//! A [`Command`] records one completed mutation of a model and knows how to
//! reverse it. Reversal consumes the command and yields its inverse, so a
//! command is reverted at most once and is never mutated in place.
//!
//! [`HistoryEntry`] is what the undo history stores: a single command or a
//! batch of commands sharing one undo slot.

use std::fmt;

/// A reversible unit of change (Command pattern).
///
/// The caller performs the mutation and then records it as a command; the
/// command stores whatever it needs to restore the previous state.
///
/// # Example
///
/// ```
/// use levelforge_core::abstract_editor::Command;
///
/// struct Counter {
///     value: i32,
/// }
///
/// /// Restores `previous` into the counter.
/// #[derive(Debug)]
/// struct SetValue {
///     previous: i32,
/// }
///
/// impl Command for SetValue {
///     type Model = Counter;
///
///     fn name(&self) -> &str {
///         "Set value"
///     }
///
///     fn revert(self, model: &mut Counter) -> Self {
///         let current = std::mem::replace(&mut model.value, self.previous);
///         SetValue { previous: current }
///     }
/// }
///
/// let mut counter = Counter { value: 0 };
/// counter.value = 5;
/// let command = SetValue { previous: 0 };
///
/// let inverse = command.revert(&mut counter);
/// assert_eq!(counter.value, 0);
/// inverse.revert(&mut counter);
/// assert_eq!(counter.value, 5);
/// ```
pub trait Command: fmt::Debug + Sized {
    /// The model this command mutates.
    type Model: ?Sized;

    /// A short, human-readable name for menus and the history panel.
    ///
    /// Examples: `"Move actor"`, `"Insert rail point"`.
    fn name(&self) -> &str;

    /// Reverses the recorded change on `model` and returns the command that
    /// re-applies it.
    ///
    /// Commands are assumed always applicable; reversal cannot fail.
    fn revert(self, model: &mut Self::Model) -> Self;
}

/// One slot of the undo or redo stack.
#[derive(Debug)]
pub enum HistoryEntry<C> {
    /// A single command.
    Single(C),
    /// Commands committed inside one batch, in commit order.
    Batch { name: String, commands: Vec<C> },
}

impl<C: Command> HistoryEntry<C> {
    /// Number of commands in this entry.
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Batch { commands, .. } => commands.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The commands of this entry in application order.
    pub fn commands(&self) -> &[C] {
        match self {
            Self::Single(command) => std::slice::from_ref(command),
            Self::Batch { commands, .. } => commands,
        }
    }
}

impl<C: Command> Command for HistoryEntry<C> {
    type Model = C::Model;

    fn name(&self) -> &str {
        match self {
            Self::Single(command) => command.name(),
            Self::Batch { name, .. } => name.as_str(),
        }
    }

    /// Reverts batched commands last-to-first. The inverse batch stores them
    /// so that reverting it replays the original order.
    fn revert(self, model: &mut C::Model) -> Self {
        match self {
            Self::Single(command) => Self::Single(command.revert(model)),
            Self::Batch { name, commands } => Self::Batch {
                name,
                commands: commands
                    .into_iter()
                    .rev()
                    .map(|command| command.revert(model))
                    .collect(),
            },
        }
    }
}
