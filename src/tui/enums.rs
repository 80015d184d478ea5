//! Enumerations for TUI state management.

use crate::fields::EntryId;

/// Which screen or modal currently receives input.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AppState {
    /// Browsing the task tree.
    TaskList,
    /// "Add task" form popup.
    AddTask,
    /// "Add subtask" form popup for the given task.
    AddSubtask(u64),
    /// Inline edit form replacing the entry's card.
    Editing(EntryId),
    /// Delete confirmation for the given entry.
    Confirm(EntryId),
    /// Blocking notification; any key dismisses it.
    Alert,
    Help,
}
