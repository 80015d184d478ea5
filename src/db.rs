//! In-memory task list and lookup/formatting helpers.
//!
//! This module provides the `Database` struct that holds the ordered task list
//! exactly as it is persisted, along with identifier resolution and the
//! timestamp formatting used by both the CLI and the TUI.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{Subtask, Task};

/// Ordered list of top-level tasks. Serialises as a bare JSON array.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Database {
    pub tasks: Vec<Task>,
}

impl Database {
    /// Parse a snapshot blob.
    pub fn from_snapshot(blob: &str) -> serde_json::Result<Self> {
        let mut db: Database = serde_json::from_str(blob)?;
        db.backfill_ids();
        Ok(db)
    }

    /// Serialise the full list.
    pub fn to_snapshot(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Generate the next available id. Tasks and subtasks share one id space.
    pub fn next_id(&self) -> u64 {
        self.tasks
            .iter()
            .flat_map(|t| std::iter::once(t.id).chain(t.subtasks.iter().map(|s| s.id)))
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Give every entry without an id (snapshots written before ids existed) a fresh one.
    fn backfill_ids(&mut self) {
        let mut next = self.next_id();
        for task in &mut self.tasks {
            if task.id == 0 {
                task.id = next;
                next += 1;
            }
            for sub in &mut task.subtasks {
                if sub.id == 0 {
                    sub.id = next;
                    next += 1;
                }
            }
        }
    }

    /// Get a task by id.
    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Get a mutable reference to a task by id.
    pub fn get_mut(&mut self, id: u64) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Get a subtask by its parent's id and its own id.
    pub fn get_subtask(&self, task_id: u64, subtask_id: u64) -> Option<&Subtask> {
        self.get(task_id)?.subtask(subtask_id)
    }

    /// Resolve a task identifier (either id or title) to a task id.
    pub fn resolve_task(&self, identifier: &str) -> Result<u64, String> {
        let identifier = identifier.trim();
        if let Ok(id) = identifier.trim_start_matches('#').parse::<u64>() {
            return match self.get(id) {
                Some(_) => Ok(id),
                None => Err(format!("Task with ID {id} not found")),
            };
        }
        let wanted = identifier.to_lowercase();
        self.tasks
            .iter()
            .find(|t| t.title.to_lowercase() == wanted)
            .map(|t| t.id)
            .ok_or_else(|| format!("No task found with title '{identifier}'"))
    }

    /// Resolve a subtask identifier (id or title) within one task.
    pub fn resolve_subtask(&self, task_id: u64, identifier: &str) -> Result<u64, String> {
        let task = self
            .get(task_id)
            .ok_or_else(|| format!("Task with ID {task_id} not found"))?;
        let identifier = identifier.trim();
        if let Ok(id) = identifier.trim_start_matches('#').parse::<u64>() {
            return match task.subtask(id) {
                Some(_) => Ok(id),
                None => Err(format!("Subtask with ID {id} not found under '{}'", task.title)),
            };
        }
        let wanted = identifier.to_lowercase();
        task.subtasks
            .iter()
            .find(|s| s.title.to_lowercase() == wanted)
            .map(|s| s.id)
            .ok_or_else(|| format!("No subtask '{identifier}' under '{}'", task.title))
    }
}

/// Default display format for timestamps.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Format a UTC timestamp in local time.
pub fn format_local(ts: DateTime<Utc>, fmt: &str) -> String {
    ts.with_timezone(&Local).format(fmt).to_string()
}

/// Format an optional deadline for editing, in a form `parse_deadline_input` reads back.
pub fn format_deadline_input(deadline: Option<DateTime<Utc>>) -> String {
    deadline
        .map(|d| format_local(d, "%Y-%m-%d %H:%M"))
        .unwrap_or_default()
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}
