//! The task store: the owned task list plus its persisted mirror.
//!
//! Every mutating method validates first, then changes the in-memory list,
//! then writes the whole snapshot. If the write fails the list is rolled back,
//! so memory and storage never disagree after a call returns.

use std::io;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::fields::Level;
use crate::storage::Storage;
use crate::task::{Draft, Subtask, Task};
use crate::validate::{is_duplicate_title, validate_deadline, validate_title, ValidationError};

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("task #{0} not found")]
    TaskNotFound(u64),
    #[error("subtask #{subtask} not found under task #{task}")]
    SubtaskNotFound { task: u64, subtask: u64 },
    #[error("failed to serialise tasks: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to save tasks to {location}: {source}")]
    Save {
        location: String,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// The validation failure behind this error, if that is what it is.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            StoreError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

type Clock = Box<dyn Fn() -> DateTime<Utc>>;

/// Owned task list bound to a storage backend.
pub struct Store {
    db: Database,
    storage: Box<dyn Storage>,
    clock: Clock,
}

impl Store {
    /// Open a store, loading whatever snapshot the backend holds.
    pub fn open(storage: Box<dyn Storage>) -> Self {
        let db = Self::load(storage.as_ref());
        Self {
            db,
            storage,
            clock: Box::new(Utc::now),
        }
    }

    /// Replace the system clock. Used to make deadline checks deterministic.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Read a snapshot from `storage`. Absent or malformed data yields an empty list.
    pub fn load(storage: &dyn Storage) -> Database {
        match storage.read() {
            Ok(Some(blob)) => match Database::from_snapshot(&blob) {
                Ok(db) => {
                    debug!(location = %storage.location(), tasks = db.tasks.len(), "snapshot loaded");
                    db
                }
                Err(e) => {
                    warn!(location = %storage.location(), error = %e, "malformed snapshot, starting empty");
                    Database::default()
                }
            },
            Ok(None) => {
                debug!(location = %storage.location(), "no snapshot yet");
                Database::default()
            }
            Err(e) => {
                warn!(location = %storage.location(), error = %e, "could not read snapshot, starting empty");
                Database::default()
            }
        }
    }

    /// Reload from storage, dropping in-memory state.
    pub fn reload(&mut self) {
        self.db = Self::load(self.storage.as_ref());
    }

    /// Write the full list to storage.
    pub fn save(&mut self) -> Result<(), StoreError> {
        let blob = self.db.to_snapshot()?;
        self.storage.write(&blob).map_err(|source| StoreError::Save {
            location: self.storage.location(),
            source,
        })?;
        debug!(location = %self.storage.location(), bytes = blob.len(), "snapshot saved");
        Ok(())
    }

    /// Current time according to the store's clock.
    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn tasks(&self) -> &[Task] {
        &self.db.tasks
    }

    pub fn location(&self) -> String {
        self.storage.location()
    }

    /// Persist after a mutation, restoring `previous` if the write fails.
    fn commit(&mut self, previous: Vec<Task>) -> Result<(), StoreError> {
        if let Err(e) = self.save() {
            warn!(error = %e, "save failed, rolling back");
            self.db.tasks = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Insert a new top-level task. Returns its id.
    pub fn add_task(&mut self, draft: Draft) -> Result<u64, StoreError> {
        let now = self.now();
        let title = validate_title(&draft.title, Level::Task)?;
        if is_duplicate_title(title, self.db.tasks.iter().map(|t| t.title.as_str()), None) {
            return Err(ValidationError::DuplicateTitle { level: Level::Task }.into());
        }
        let deadline = validate_deadline(draft.deadline, now, now)?;

        let id = self.db.next_id();
        let task = Task {
            id,
            title: title.to_string(),
            description: draft.description.trim().to_string(),
            created: now,
            deadline,
            completed: false,
            subtasks: Vec::new(),
        };
        let previous = self.db.tasks.clone();
        self.db.tasks.push(task);
        self.commit(previous)?;
        info!(task_id = id, "task added");
        Ok(id)
    }

    /// Insert a subtask under `task_id`. Returns the subtask's id.
    pub fn add_subtask(&mut self, task_id: u64, draft: Draft) -> Result<u64, StoreError> {
        let now = self.now();
        let id = self.db.next_id();
        let previous = self.db.tasks.clone();
        let task = self.db.get_mut(task_id).ok_or(StoreError::TaskNotFound(task_id))?;

        let title = validate_title(&draft.title, Level::Subtask)?;
        if is_duplicate_title(title, task.subtasks.iter().map(|s| s.title.as_str()), None) {
            return Err(ValidationError::DuplicateTitle { level: Level::Subtask }.into());
        }
        let deadline = validate_deadline(draft.deadline, now, now)?;

        task.subtasks.push(Subtask {
            id,
            title: title.to_string(),
            description: draft.description.trim().to_string(),
            created: now,
            deadline,
            completed: false,
        });
        self.commit(previous)?;
        info!(task_id, subtask_id = id, "subtask added");
        Ok(id)
    }

    /// Replace a task's title, description and deadline.
    ///
    /// The one-hour rule is checked against the task's original creation time.
    pub fn update_task(&mut self, task_id: u64, draft: Draft) -> Result<(), StoreError> {
        let now = self.now();
        let current = self.db.get(task_id).ok_or(StoreError::TaskNotFound(task_id))?;

        let title = validate_title(&draft.title, Level::Task)?;
        let siblings = self.db.tasks.iter().map(|t| t.title.as_str());
        if is_duplicate_title(title, siblings, Some(&current.title)) {
            return Err(ValidationError::DuplicateTitle { level: Level::Task }.into());
        }
        let deadline = validate_deadline(draft.deadline, current.created, now)?;
        let title = title.to_string();

        let previous = self.db.tasks.clone();
        let task = self.db.get_mut(task_id).ok_or(StoreError::TaskNotFound(task_id))?;
        task.title = title;
        task.description = draft.description.trim().to_string();
        task.deadline = deadline;
        self.commit(previous)?;
        info!(task_id, "task updated");
        Ok(())
    }

    /// Replace a subtask's title, description and deadline.
    pub fn update_subtask(
        &mut self,
        task_id: u64,
        subtask_id: u64,
        draft: Draft,
    ) -> Result<(), StoreError> {
        let now = self.now();
        let previous = self.db.tasks.clone();
        let task = self.db.get_mut(task_id).ok_or(StoreError::TaskNotFound(task_id))?;
        let current = task.subtask(subtask_id).ok_or(StoreError::SubtaskNotFound {
            task: task_id,
            subtask: subtask_id,
        })?;

        let title = validate_title(&draft.title, Level::Subtask)?;
        let siblings = task.subtasks.iter().map(|s| s.title.as_str());
        if is_duplicate_title(title, siblings, Some(&current.title)) {
            return Err(ValidationError::DuplicateTitle { level: Level::Subtask }.into());
        }
        let deadline = validate_deadline(draft.deadline, current.created, now)?;
        let title = title.to_string();

        if let Some(sub) = task.subtask_mut(subtask_id) {
            sub.title = title;
            sub.description = draft.description.trim().to_string();
            sub.deadline = deadline;
        }
        self.commit(previous)?;
        info!(task_id, subtask_id, "subtask updated");
        Ok(())
    }

    /// Remove a task together with all of its subtasks.
    pub fn delete_task(&mut self, task_id: u64) -> Result<Task, StoreError> {
        let idx = self
            .db
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or(StoreError::TaskNotFound(task_id))?;
        let previous = self.db.tasks.clone();
        let removed = self.db.tasks.remove(idx);
        self.commit(previous)?;
        info!(task_id, subtasks = removed.subtasks.len(), "task deleted");
        Ok(removed)
    }

    /// Remove one subtask, leaving its parent and siblings untouched.
    pub fn delete_subtask(&mut self, task_id: u64, subtask_id: u64) -> Result<Subtask, StoreError> {
        let previous = self.db.tasks.clone();
        let task = self.db.get_mut(task_id).ok_or(StoreError::TaskNotFound(task_id))?;
        let idx = task
            .subtasks
            .iter()
            .position(|s| s.id == subtask_id)
            .ok_or(StoreError::SubtaskNotFound {
                task: task_id,
                subtask: subtask_id,
            })?;
        let removed = task.subtasks.remove(idx);
        self.commit(previous)?;
        info!(task_id, subtask_id, "subtask deleted");
        Ok(removed)
    }

    /// Flip a task's completion flag. Returns the new value.
    pub fn toggle_task_completed(&mut self, task_id: u64) -> Result<bool, StoreError> {
        let previous = self.db.tasks.clone();
        let task = self.db.get_mut(task_id).ok_or(StoreError::TaskNotFound(task_id))?;
        task.completed = !task.completed;
        let completed = task.completed;
        self.commit(previous)?;
        debug!(task_id, completed, "task completion toggled");
        Ok(completed)
    }

    /// Flip a subtask's completion flag. Returns the new value.
    pub fn toggle_subtask_completed(
        &mut self,
        task_id: u64,
        subtask_id: u64,
    ) -> Result<bool, StoreError> {
        let previous = self.db.tasks.clone();
        let sub = self
            .db
            .get_mut(task_id)
            .ok_or(StoreError::TaskNotFound(task_id))?
            .subtask_mut(subtask_id)
            .ok_or(StoreError::SubtaskNotFound {
                task: task_id,
                subtask: subtask_id,
            })?;
        sub.completed = !sub.completed;
        let completed = sub.completed;
        self.commit(previous)?;
        debug!(task_id, subtask_id, completed, "subtask completion toggled");
        Ok(completed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    use super::*;
    use crate::storage::{JsonFile, MemoryStorage};
    use crate::task::Entry;

    pub(crate) fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap()
    }

    /// Store over memory storage with a clock the test can move.
    pub(crate) fn test_store() -> (Store, MemoryStorage, Rc<Cell<DateTime<Utc>>>) {
        let storage = MemoryStorage::default();
        let clock = Rc::new(Cell::new(t0()));
        let handle = clock.clone();
        let store = Store::open(Box::new(storage.clone())).with_clock(move || handle.get());
        (store, storage, clock)
    }

    fn snapshot(storage: &MemoryStorage) -> Database {
        Database::from_snapshot(&storage.blob().unwrap()).unwrap()
    }

    #[test]
    fn add_task_persists_immediately() {
        let (mut store, storage, _) = test_store();
        let id = store.add_task(Draft::new("  Buy milk ").description(" 2 litres ")).unwrap();

        let task = store.database().get(id).unwrap();
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.description, "2 litres");
        assert_eq!(task.created, t0());
        assert!(!task.completed);
        assert!(task.deadline.is_none());
        assert_eq!(storage.writes(), 1);
        assert_eq!(snapshot(&storage), *store.database());
    }

    #[test]
    fn walkthrough_example() {
        let (mut store, _, clock) = test_store();
        store.add_task(Draft::new("Buy milk")).unwrap();

        let err = store.add_task(Draft::new("Buy milk")).unwrap_err();
        assert_eq!(
            err.as_validation(),
            Some(&ValidationError::DuplicateTitle { level: Level::Task })
        );

        let soon = Some(t0() + Duration::minutes(30));
        let err = store.add_task(Draft::new("Pay bills").deadline(soon)).unwrap_err();
        assert_eq!(err.as_validation(), Some(&ValidationError::TooSoonAfterCreation));

        let later = Some(t0() + Duration::hours(2));
        let id = store.add_task(Draft::new("Pay bills").deadline(later)).unwrap();
        assert_eq!(store.tasks().len(), 2);

        clock.set(t0() + Duration::hours(3));
        let task = store.database().get(id).unwrap();
        assert!(task.is_expired(store.now()));
    }

    #[test]
    fn failed_validation_leaves_store_untouched() {
        let (mut store, storage, _) = test_store();
        store.add_task(Draft::new("Buy milk")).unwrap();
        let before = store.database().clone();
        let writes = storage.writes();

        assert!(store.add_task(Draft::new("BUY MILK")).is_err());
        assert!(store.add_task(Draft::new("   ")).is_err());
        let past = Some(t0() - Duration::minutes(5));
        assert!(store.add_task(Draft::new("Pay bills").deadline(past)).is_err());

        assert_eq!(*store.database(), before);
        assert_eq!(storage.writes(), writes);
    }

    #[test]
    fn subtask_titles_are_scoped_per_task() {
        let (mut store, _, _) = test_store();
        let a = store.add_task(Draft::new("Groceries")).unwrap();
        let b = store.add_task(Draft::new("Party")).unwrap();

        store.add_subtask(a, Draft::new("Buy milk")).unwrap();
        // Same title under a different task is fine.
        store.add_subtask(b, Draft::new("buy milk")).unwrap();
        // And a subtask may share a title with a top-level task.
        store.add_subtask(b, Draft::new("Groceries")).unwrap();

        let err = store.add_subtask(a, Draft::new("BUY MILK")).unwrap_err();
        assert_eq!(
            err.as_validation(),
            Some(&ValidationError::DuplicateTitle { level: Level::Subtask })
        );
        let err = store.add_subtask(a, Draft::new(" ")).unwrap_err();
        assert_eq!(err.as_validation(), Some(&ValidationError::EmptySubtaskTitle));
        assert!(matches!(
            store.add_subtask(99, Draft::new("x")),
            Err(StoreError::TaskNotFound(99))
        ));
    }

    #[test]
    fn editing_with_unchanged_title_is_not_a_duplicate() {
        let (mut store, _, _) = test_store();
        let a = store.add_task(Draft::new("Buy milk")).unwrap();
        store.add_task(Draft::new("Pay bills")).unwrap();

        store.update_task(a, Draft::new("Buy milk").description("semi-skimmed")).unwrap();
        store.update_task(a, Draft::new("buy Milk")).unwrap();
        assert_eq!(store.database().get(a).unwrap().title, "buy Milk");

        let err = store.update_task(a, Draft::new("PAY BILLS")).unwrap_err();
        assert_eq!(
            err.as_validation(),
            Some(&ValidationError::DuplicateTitle { level: Level::Task })
        );

        let sub = store.add_subtask(a, Draft::new("Find wallet")).unwrap();
        store.add_subtask(a, Draft::new("Find keys")).unwrap();
        store.update_subtask(a, sub, Draft::new("Find wallet").description("pocket")).unwrap();
        assert!(store.update_subtask(a, sub, Draft::new("find keys")).is_err());
        assert_eq!(store.database().get_subtask(a, sub).unwrap().description, "pocket");
    }

    #[test]
    fn edit_deadline_is_anchored_on_original_creation() {
        let (mut store, _, clock) = test_store();
        let id = store.add_task(Draft::new("Report")).unwrap();

        clock.set(t0() + Duration::hours(4));
        // 40 minutes from the edit, but hours after creation.
        let deadline = Some(store.now() + Duration::minutes(40));
        store.update_task(id, Draft::new("Report").deadline(deadline)).unwrap();
        assert_eq!(store.database().get(id).unwrap().deadline, deadline);
        assert_eq!(store.database().get(id).unwrap().created, t0());

        let past = Some(store.now() - Duration::minutes(1));
        let err = store.update_task(id, Draft::new("Report").deadline(past)).unwrap_err();
        assert_eq!(err.as_validation(), Some(&ValidationError::PastDeadline));
    }

    #[test]
    fn deleting_task_removes_its_subtasks() {
        let (mut store, storage, _) = test_store();
        let a = store.add_task(Draft::new("Groceries")).unwrap();
        let b = store.add_task(Draft::new("Party")).unwrap();
        store.add_subtask(a, Draft::new("Milk")).unwrap();
        store.add_subtask(a, Draft::new("Eggs")).unwrap();

        let removed = store.delete_task(a).unwrap();
        assert_eq!(removed.subtasks.len(), 2);
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.tasks()[0].id, b);
        assert_eq!(snapshot(&storage).tasks.len(), 1);
        assert!(matches!(store.delete_task(a), Err(StoreError::TaskNotFound(_))));
    }

    #[test]
    fn deleting_subtask_keeps_siblings_and_parent() {
        let (mut store, _, _) = test_store();
        let a = store.add_task(Draft::new("Groceries")).unwrap();
        let milk = store.add_subtask(a, Draft::new("Milk")).unwrap();
        let eggs = store.add_subtask(a, Draft::new("Eggs")).unwrap();
        let bread = store.add_subtask(a, Draft::new("Bread")).unwrap();

        store.delete_subtask(a, eggs).unwrap();
        let task = store.database().get(a).unwrap();
        let ids: Vec<u64> = task.subtasks.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![milk, bread]);
        assert!(matches!(
            store.delete_subtask(a, eggs),
            Err(StoreError::SubtaskNotFound { .. })
        ));
    }

    #[test]
    fn failed_write_rolls_back() {
        let (mut store, storage, _) = test_store();
        let a = store.add_task(Draft::new("Groceries")).unwrap();
        storage.fail_writes(true);

        assert!(matches!(store.add_task(Draft::new("Party")), Err(StoreError::Save { .. })));
        assert!(store.toggle_task_completed(a).is_err());
        assert!(store.delete_task(a).is_err());

        assert_eq!(store.tasks().len(), 1);
        assert!(!store.tasks()[0].completed);
        assert_eq!(snapshot(&storage), *store.database());
    }

    #[test]
    fn malformed_snapshot_loads_empty() {
        let storage = MemoryStorage::with_blob("{not json");
        let store = Store::open(Box::new(storage));
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn reopens_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(Box::new(JsonFile::in_dir(dir.path())));
        let a = store.add_task(Draft::new("Groceries")).unwrap();
        let s = store.add_subtask(a, Draft::new("Milk")).unwrap();
        store.toggle_subtask_completed(a, s).unwrap();

        let reopened = Store::open(Box::new(JsonFile::in_dir(dir.path())));
        assert_eq!(reopened.database(), store.database());
        assert!(reopened.database().get_subtask(a, s).unwrap().completed);
    }

    proptest! {
        #[test]
        fn unique_titles_appear_exactly_once(titles in prop::collection::hash_set("[a-z]{1,8}", 1..8)) {
            let (mut store, _, _) = test_store();
            for title in &titles {
                store.add_task(Draft::new(title.as_str())).unwrap();
            }
            for title in &titles {
                let n = store.tasks().iter().filter(|t| &t.title == title).count();
                prop_assert_eq!(n, 1);
            }
        }

        #[test]
        fn toggling_twice_restores_completion(
            toggle_sub in any::<bool>(),
            start_done in any::<bool>(),
        ) {
            let (mut store, _, _) = test_store();
            let a = store.add_task(Draft::new("Groceries")).unwrap();
            let s = store.add_subtask(a, Draft::new("Milk")).unwrap();
            if start_done {
                store.toggle_task_completed(a).unwrap();
                store.toggle_subtask_completed(a, s).unwrap();
            }
            let before = store.database().clone();
            for _ in 0..2 {
                if toggle_sub {
                    store.toggle_subtask_completed(a, s).unwrap();
                } else {
                    store.toggle_task_completed(a).unwrap();
                }
            }
            prop_assert_eq!(store.database(), &before);
        }
    }
}
