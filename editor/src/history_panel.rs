use levelforge_core::abstract_editor::{Command, HistoryEntry, UndoHistory};

use crate::commands::CourseCommand;

/// Renders the undo/redo history as text lines for a debug panel or log.
///
/// Redo entries come first, the next one to redo closest to the cursor line;
/// undo entries follow, most recent first. Batches show their command count.
pub fn history_lines(history: &UndoHistory<CourseCommand>) -> Vec<String> {
    let mut lines = Vec::with_capacity(history.undo_count() + history.redo_count() + 2);
    lines.push(format!(
        "Undo: {} | Redo: {}{}",
        history.undo_count(),
        history.redo_count(),
        if history.has_unsaved_changes() { " (modified)" } else { "" }
    ));

    // Show redo entries in reverse so the next-to-redo is closest to the cursor
    let redo: Vec<_> = history.redo_stack().collect();
    for entry in redo.iter().rev() {
        lines.push(format!("REDO  {}", describe(entry)));
    }

    lines.push("▸ current".to_string());

    for entry in history.undo_stack() {
        lines.push(format!("UNDO  {}", describe(entry)));
    }
    lines
}

fn describe(entry: &HistoryEntry<CourseCommand>) -> String {
    match entry {
        HistoryEntry::Single(command) => command.name().to_string(),
        HistoryEntry::Batch { name, commands } => format!("{name} [{}]", commands.len()),
    }
}
