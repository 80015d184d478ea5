//! Per-entry view state.
//!
//! Whether an entry's details are expanded is presentation state, so it lives
//! here keyed by `EntryId` rather than on the task types, and is never
//! persisted. The entry being edited is tracked by `AppState::Editing`.

use std::collections::HashSet;

use crate::db::Database;
use crate::fields::EntryId;

#[derive(Debug, Default, Clone)]
pub struct ViewState {
    details: HashSet<EntryId>,
}

impl ViewState {
    /// Flip the details flag for `id`. Returns the new value.
    pub fn toggle_details(&mut self, id: EntryId) -> bool {
        if self.details.remove(&id) {
            false
        } else {
            self.details.insert(id);
            true
        }
    }

    pub fn show_details(&mut self, id: EntryId) {
        self.details.insert(id);
    }

    pub fn details_shown(&self, id: EntryId) -> bool {
        self.details.contains(&id)
    }

    /// Drop flags for entries that no longer exist.
    pub fn retain_existing(&mut self, db: &Database) {
        self.details.retain(|id| match *id {
            EntryId::Task(t) => db.get(t).is_some(),
            EntryId::Subtask { task, subtask } => db.get_subtask(task, subtask).is_some(),
        });
    }

    /// Entries in display order: every task, followed by its subtasks when
    /// the task's details are shown and it is not being edited.
    pub fn visible_entries(&self, db: &Database, editing: Option<EntryId>) -> Vec<EntryId> {
        let mut out = Vec::new();
        for task in &db.tasks {
            let id = EntryId::Task(task.id);
            out.push(id);
            if self.details_shown(id) && editing != Some(id) {
                out.extend(task.subtasks.iter().map(|s| EntryId::Subtask {
                    task: task.id,
                    subtask: s.id,
                }));
            }
        }
        out
    }
}
