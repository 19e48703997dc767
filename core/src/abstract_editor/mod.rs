//! Abstract editor framework: transactional editing with selection and
//! undo/redo.
//!
//! This module is decoupled from any concrete document type. Higher-level
//! crates pick a model, a [`ViewObject`](crate::reconcile::ViewObject) type
//! and a [`Command`] type, then drive everything through an [`EditContext`].
//!
//! - [`Command`]: a recorded, reversible mutation (swap pattern)
//! - [`HistoryEntry`]: one undo step, either a single command or a named batch
//! - [`UndoHistory`]: bounded undo/redo stacks with save-point tracking
//! - [`Selection`]: selected keys plus the active one
//! - [`EditContext`]: owns model, views, selection and history; fires
//!   update notifications
//!
//! # Batches
//!
//! [`EditContext::batch_action`] groups every command committed inside it
//! into one [`HistoryEntry::Batch`]. Batches nest: only the outermost one
//! creates an entry, under the outermost body's name. Undoing a batch
//! reverts its commands newest-first; redoing replays them in their original
//! order.
//!
//! # Notifications
//!
//! Each observable change (a commit, a net selection change, an undo or a
//! redo) fires one update, which rebuilds the views. Inside
//! [`EditContext::with_suspend_update_do`] updates coalesce into at most one
//! when the outermost suspension ends.

mod command;
mod context;
mod error;
mod history;
mod selection;

pub use command::{Command, HistoryEntry};
pub use context::{EditContext, SelectionChanged, SelectionFilter, UpdateEvent};
pub use error::{EditError, EditResult};
pub use history::{DEFAULT_MAX_UNDO, UndoHistory};
pub use selection::Selection;
