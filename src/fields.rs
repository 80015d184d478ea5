//! Enumerations and identity types shared by the store, the CLI and the TUI.
//!
//! The hierarchy is fixed at two levels, so an entity is addressed either as
//! a task id or as a (task id, subtask id) pair.

use std::fmt;

/// Level of an entity in the two-level hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Task,
    Subtask,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Task => f.write_str("Task"),
            Level::Subtask => f.write_str("Subtask"),
        }
    }
}

/// Stable address of a task or subtask.
///
/// View state (details shown, edit mode) is keyed by this, so it survives
/// deletes and reorders of neighbouring entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryId {
    Task(u64),
    Subtask { task: u64, subtask: u64 },
}

impl EntryId {
    /// Hierarchy level of the addressed entity.
    pub fn level(self) -> Level {
        match self {
            EntryId::Task(_) => Level::Task,
            EntryId::Subtask { .. } => Level::Subtask,
        }
    }

    /// Id of the owning top-level task (the task itself for `Task`).
    pub fn task_id(self) -> u64 {
        match self {
            EntryId::Task(id) => id,
            EntryId::Subtask { task, .. } => task,
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Task(id) => write!(f, "#{id}"),
            EntryId::Subtask { task, subtask } => write!(f, "#{task}/{subtask}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_id_reports_owning_task() {
        assert_eq!(EntryId::Task(4).task_id(), 4);
        assert_eq!(EntryId::Subtask { task: 4, subtask: 9 }.task_id(), 4);
        assert_eq!(EntryId::Subtask { task: 4, subtask: 9 }.level(), Level::Subtask);
        assert_eq!(EntryId::Subtask { task: 4, subtask: 9 }.to_string(), "#4/9");
    }
}
