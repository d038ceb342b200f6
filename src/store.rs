// Task store: the in-memory collection kept in sync with snapshot storage

use crate::error::StoreError;
use crate::filter::TaskFilter;
use crate::ids::IdGenerator;
use crate::snapshot;
use crate::storage::SnapshotStorage;
use crate::task::{Task, TaskId, normalize_name};
use crate::view::{Projection, project};
use eyre::WrapErr;
use tracing::{debug, info, warn};

/// Owns the task collection and the active filter
///
/// Every successful mutation rewrites the full snapshot. When that write
/// fails the mutation stays applied in memory and the caller receives
/// [`StoreError::Persistence`]; memory is then ahead of storage until the
/// next successful save.
pub struct TaskStore<S: SnapshotStorage> {
    storage: S,
    tasks: Vec<Task>,
    filter: TaskFilter,
    ids: IdGenerator,
    /// Loaded snapshot needed repair and has not been rewritten yet
    dirty: bool,
}

impl<S: SnapshotStorage> TaskStore<S> {
    /// Open a store over `storage`, loading whatever snapshot it holds
    pub fn open(storage: S) -> Self {
        Self::with_ids(storage, IdGenerator::new())
    }

    /// Open with a specific id generator
    pub fn with_ids(storage: S, ids: IdGenerator) -> Self {
        let mut store = Self {
            storage,
            tasks: Vec::new(),
            filter: TaskFilter::All,
            ids,
            dirty: false,
        };
        store.load();
        store
    }

    /// Replace the in-memory collection with the stored snapshot
    ///
    /// Absent, unreadable or malformed snapshots load as an empty
    /// collection. The filter is reset to `All`. Nothing is written.
    pub fn load(&mut self) -> &[Task] {
        let raw = match self.storage.load() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = ?e, "Failed to read snapshot, starting empty");
                None
            }
        };

        let decoded = snapshot::decode(raw.as_deref());
        for task in &decoded.tasks {
            self.ids.observe(task.id);
        }

        self.tasks = decoded.tasks;
        self.dirty = decoded.repaired;
        self.filter = TaskFilter::All;

        info!(count = self.tasks.len(), repaired = self.dirty, "Loaded tasks");
        &self.tasks
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn filter(&self) -> TaskFilter {
        self.filter
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when the loaded snapshot was repaired and not yet rewritten
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Visible tasks under the current filter, plus the outstanding count
    pub fn view(&self) -> Projection {
        project(&self.tasks, self.filter)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Append a new outstanding task and reset the filter to `All`
    pub fn add_task(&mut self, raw_name: &str) -> Result<Task, StoreError> {
        let name = normalize_name(raw_name)?;
        let id = self
            .ids
            .issue()
            .ok_or_else(|| StoreError::validation("no task ids left"))?;
        let task = Task::new(id, name);

        debug!(id = task.id, "add_task: appending");
        self.tasks.push(task.clone());
        self.filter = TaskFilter::All;

        self.persist()?;
        Ok(task)
    }

    /// Remove the task with `id`; returns whether one was removed
    ///
    /// An unknown id is a no-op and nothing is written.
    pub fn remove_task(&mut self, id: TaskId) -> Result<bool, StoreError> {
        let Some(index) = self.position(id) else {
            debug!(id, "remove_task: no such task");
            return Ok(false);
        };

        self.tasks.remove(index);
        debug!(id, "remove_task: removed");

        self.persist()?;
        Ok(true)
    }

    /// Rename a task in place, keeping its id, position and completion flag
    pub fn edit_task(&mut self, id: TaskId, new_raw_name: &str) -> Result<Task, StoreError> {
        let name = normalize_name(new_raw_name)?;
        let index = self.position(id).ok_or(StoreError::NotFound(id))?;

        self.tasks[index].name = name;
        let task = self.tasks[index].clone();
        debug!(id, "edit_task: renamed");

        self.persist()?;
        Ok(task)
    }

    /// Flip the completion flag; returns the new value
    pub fn toggle_complete(&mut self, id: TaskId) -> Result<bool, StoreError> {
        let index = self.position(id).ok_or(StoreError::NotFound(id))?;

        let task = &mut self.tasks[index];
        task.completed = !task.completed;
        let completed = task.completed;
        debug!(id, completed, "toggle_complete: flipped");

        self.persist()?;
        Ok(completed)
    }

    /// Remove every task matching `filter`; returns how many were removed
    ///
    /// Fails with [`StoreError::EmptyClear`] without touching anything when
    /// no task matches.
    pub fn clear(&mut self, filter: TaskFilter) -> Result<usize, StoreError> {
        let before = self.tasks.len();
        let matching = self.tasks.iter().filter(|t| filter.matches(t)).count();

        if matching == 0 {
            return Err(StoreError::EmptyClear(filter));
        }

        self.tasks.retain(|t| !filter.matches(t));
        let removed = before - self.tasks.len();
        debug!(%filter, removed, "clear: removed tasks");

        self.persist()?;
        Ok(removed)
    }

    /// Change the active filter; not persisted
    pub fn set_filter(&mut self, filter: TaskFilter) {
        debug!(%filter, "set_filter");
        self.filter = filter;
    }

    /// Parse and apply a filter name
    pub fn set_filter_str(&mut self, value: &str) -> Result<TaskFilter, StoreError> {
        let filter = value.parse::<TaskFilter>()?;
        self.set_filter(filter);
        Ok(filter)
    }

    /// Write the current collection, e.g. to retry after a failed save
    pub fn persist(&mut self) -> Result<(), StoreError> {
        let result = snapshot::encode(&self.tasks).and_then(|raw| {
            self.storage
                .save(&raw)
                .wrap_err_with(|| format!("Failed to save snapshot of {} tasks", self.tasks.len()))
        });

        match result {
            Ok(()) => {
                self.dirty = false;
                debug!(count = self.tasks.len(), "Persisted snapshot");
                Ok(())
            }
            Err(e) => {
                warn!(error = ?e, "Snapshot not persisted; memory is ahead of storage");
                Err(StoreError::Persistence(e))
            }
        }
    }

    fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, MemoryStorage, SqliteStorage};
    use tempfile::TempDir;

    fn frozen_clock() -> i64 {
        1_000
    }

    fn memory_store() -> TaskStore<MemoryStorage> {
        TaskStore::with_ids(MemoryStorage::new(), IdGenerator::with_clock(frozen_clock))
    }

    fn names<S: SnapshotStorage>(store: &TaskStore<S>) -> Vec<&str> {
        store.tasks().iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_open_empty_storage() {
        let store = TaskStore::open(MemoryStorage::new());
        assert!(store.is_empty());
        assert_eq!(store.filter(), TaskFilter::All);
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_open_malformed_snapshot_is_empty() {
        let store = TaskStore::open(MemoryStorage::with_snapshot("not json"));
        assert!(store.is_empty());
        assert_eq!(store.storage().save_count(), 0);
    }

    #[test]
    fn test_add_task_on_empty_collection() {
        let mut store = memory_store();

        let task = store.add_task("Buy milk").unwrap();
        assert_eq!(task.name, "Buy milk");
        assert!(!task.completed);
        assert_eq!(store.len(), 1);
        assert_eq!(store.view().remaining_count, 1);
        assert_eq!(store.storage().save_count(), 1);
    }

    #[test]
    fn test_add_task_trims_and_appends() {
        let mut store = memory_store();
        store.add_task("first").unwrap();
        let task = store.add_task("   second  ").unwrap();

        assert_eq!(task.name, "second");
        assert_eq!(names(&store), vec!["first", "second"]);
    }

    #[test]
    fn test_add_task_rejects_blank_names() {
        let mut store = memory_store();
        store.add_task("keep").unwrap();

        for raw in ["", "   "] {
            let err = store.add_task(raw).unwrap_err();
            assert!(matches!(err, StoreError::Validation(ref msg) if msg == "empty task"));
        }

        assert_eq!(store.len(), 1);
        assert_eq!(store.storage().save_count(), 1);
    }

    #[test]
    fn test_add_task_ids_unique_under_frozen_clock() {
        let mut store = memory_store();
        let a = store.add_task("a").unwrap();
        let b = store.add_task("b").unwrap();
        let c = store.add_task("c").unwrap();

        assert!(a.id < b.id && b.id < c.id);
    }

    #[test]
    fn test_add_task_resets_filter() {
        let mut store = memory_store();
        store.set_filter(TaskFilter::Completed);

        store.add_task("new").unwrap();
        assert_eq!(store.filter(), TaskFilter::All);
    }

    #[test]
    fn test_failed_add_keeps_filter() {
        let mut store = memory_store();
        store.set_filter(TaskFilter::Completed);

        assert!(store.add_task("  ").is_err());
        assert_eq!(store.filter(), TaskFilter::Completed);
    }

    #[test]
    fn test_ids_never_reuse_loaded_ids() {
        let raw = r#"[{"name":"old","completed":false,"id":5000}]"#;
        let mut store = TaskStore::with_ids(MemoryStorage::with_snapshot(raw), IdGenerator::with_clock(frozen_clock));

        let task = store.add_task("new").unwrap();
        assert_eq!(task.id, 5001);
    }

    #[test]
    fn test_open_snapshot_at_max_id() {
        let raw = r#"[{"name":"a","completed":false,"id":9223372036854775807},{"name":"b","completed":false}]"#;
        let store = TaskStore::open(MemoryStorage::with_snapshot(raw));

        assert_eq!(names(&store), vec!["a"]);
        assert!(store.is_dirty());
    }

    #[test]
    fn test_add_task_fails_when_ids_exhausted() {
        let raw = r#"[{"name":"a","completed":false,"id":9223372036854775807}]"#;
        let mut store = TaskStore::with_ids(MemoryStorage::with_snapshot(raw), IdGenerator::with_clock(frozen_clock));

        let err = store.add_task("b").unwrap_err();
        assert!(matches!(err, StoreError::Validation(ref msg) if msg == "no task ids left"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.storage().save_count(), 0);
    }

    #[test]
    fn test_remove_task() {
        let mut store = memory_store();
        let a = store.add_task("a").unwrap();
        store.add_task("b").unwrap();

        assert!(store.remove_task(a.id).unwrap());
        assert_eq!(names(&store), vec!["b"]);
        assert_eq!(store.storage().save_count(), 3);
    }

    #[test]
    fn test_remove_missing_task_is_noop() {
        let mut store = memory_store();
        store.add_task("a").unwrap();

        assert!(!store.remove_task(424242).unwrap());
        assert_eq!(store.len(), 1);
        assert_eq!(store.storage().save_count(), 1);
    }

    #[test]
    fn test_edit_task_keeps_position_and_flag() {
        let mut store = memory_store();
        store.add_task("a").unwrap();
        let b = store.add_task("b").unwrap();
        store.add_task("c").unwrap();
        store.toggle_complete(b.id).unwrap();

        let edited = store.edit_task(b.id, "  bee ").unwrap();
        assert_eq!(edited.id, b.id);
        assert_eq!(edited.name, "bee");
        assert!(edited.completed);
        assert_eq!(names(&store), vec!["a", "bee", "c"]);
    }

    #[test]
    fn test_edit_task_rejects_blank_name() {
        let mut store = memory_store();
        let a = store.add_task("a").unwrap();

        let err = store.edit_task(a.id, "").unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(store.get(a.id).unwrap().name, "a");
    }

    #[test]
    fn test_edit_missing_task() {
        let mut store = memory_store();
        let err = store.edit_task(99, "x").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(99)));
    }

    #[test]
    fn test_toggle_twice_restores_flag() {
        let mut store = memory_store();
        let a = store.add_task("a").unwrap();

        assert!(store.toggle_complete(a.id).unwrap());
        assert!(!store.toggle_complete(a.id).unwrap());
        assert!(!store.get(a.id).unwrap().completed);
    }

    #[test]
    fn test_toggle_missing_task() {
        let mut store = memory_store();
        assert!(matches!(store.toggle_complete(1), Err(StoreError::NotFound(1))));
    }

    #[test]
    fn test_clear_assigned_scenario() {
        let raw = r#"[{"name":"A","completed":false,"id":1},{"name":"B","completed":true,"id":2}]"#;
        let mut store = TaskStore::open(MemoryStorage::with_snapshot(raw));

        assert_eq!(store.clear(TaskFilter::Assigned).unwrap(), 1);
        assert_eq!(
            store.tasks(),
            &[Task {
                id: 2,
                name: "B".to_string(),
                completed: true
            }]
        );
    }

    #[test]
    fn test_clear_preserves_remainder_order() {
        let mut store = memory_store();
        for name in ["a", "b", "c", "d"] {
            store.add_task(name).unwrap();
        }
        let ids: Vec<TaskId> = store.tasks().iter().map(|t| t.id).collect();
        store.toggle_complete(ids[0]).unwrap();
        store.toggle_complete(ids[2]).unwrap();

        assert_eq!(store.clear(TaskFilter::Completed).unwrap(), 2);
        assert_eq!(names(&store), vec!["b", "d"]);
    }

    #[test]
    fn test_clear_all() {
        let mut store = memory_store();
        store.add_task("a").unwrap();
        store.add_task("b").unwrap();

        assert_eq!(store.clear(TaskFilter::All).unwrap(), 2);
        assert!(store.is_empty());
        assert_eq!(store.storage().snapshot(), Some("[]"));
    }

    #[test]
    fn test_clear_empty_subset_fails_without_mutation() {
        let mut store = memory_store();
        assert!(matches!(store.clear(TaskFilter::All), Err(StoreError::EmptyClear(TaskFilter::All))));

        store.add_task("open").unwrap();
        let saves = store.storage().save_count();

        let err = store.clear(TaskFilter::Completed).unwrap_err();
        assert!(matches!(err, StoreError::EmptyClear(TaskFilter::Completed)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.storage().save_count(), saves);
    }

    #[test]
    fn test_set_filter_str() {
        let mut store = memory_store();
        assert_eq!(store.set_filter_str("assigned").unwrap(), TaskFilter::Assigned);
        assert_eq!(store.filter(), TaskFilter::Assigned);

        assert!(matches!(store.set_filter_str("bogus"), Err(StoreError::Validation(_))));
        assert_eq!(store.filter(), TaskFilter::Assigned);
    }

    #[test]
    fn test_filter_is_not_persisted() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("todos.json");

        let mut store = TaskStore::open(FileStorage::new(&path));
        store.add_task("a").unwrap();
        store.set_filter(TaskFilter::Completed);
        drop(store);

        let store = TaskStore::open(FileStorage::new(&path));
        assert_eq!(store.filter(), TaskFilter::All);
    }

    #[test]
    fn test_persistence_failure_keeps_memory_mutation() {
        let mut store = memory_store();
        store.add_task("saved").unwrap();

        store.storage_mut().set_fail_saves(true);
        let err = store.add_task("unsaved").unwrap_err();
        assert!(err.is_fault());
        assert!(matches!(err, StoreError::Persistence(_)));

        // Memory is ahead of storage
        assert_eq!(names(&store), vec!["saved", "unsaved"]);
        let stored = snapshot::decode(store.storage().snapshot());
        assert_eq!(stored.tasks.len(), 1);

        // A later successful save catches storage up
        store.storage_mut().set_fail_saves(false);
        store.persist().unwrap();
        let stored = snapshot::decode(store.storage().snapshot());
        assert_eq!(stored.tasks.len(), 2);
    }

    #[test]
    fn test_reload_reproduces_collection_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("todos.json");

        let mut store = TaskStore::open(FileStorage::new(&path));
        let a = store.add_task("A").unwrap();
        store.add_task("B").unwrap();
        store.toggle_complete(a.id).unwrap();
        let before = store.tasks().to_vec();
        drop(store);

        let mut reopened = TaskStore::open(FileStorage::new(&path));
        assert_eq!(reopened.tasks(), before.as_slice());

        // Saving what was loaded changes nothing
        reopened.persist().unwrap();
        let again = TaskStore::open(FileStorage::new(&path));
        assert_eq!(again.tasks(), before.as_slice());
    }

    #[test]
    fn test_reload_reproduces_collection_sqlite() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("tasks.db");

        let mut store = TaskStore::open(SqliteStorage::open(&db_path, "todos").unwrap());
        store.add_task("A").unwrap();
        let b = store.add_task("B").unwrap();
        store.toggle_complete(b.id).unwrap();
        let before = store.tasks().to_vec();
        drop(store);

        let reopened = TaskStore::open(SqliteStorage::open(&db_path, "todos").unwrap());
        assert_eq!(reopened.tasks(), before.as_slice());
    }

    #[test]
    fn test_repaired_snapshot_marks_dirty_until_saved() {
        let raw = r#"[{"name":"legacy","completed":false}]"#;
        let mut store = TaskStore::open(MemoryStorage::with_snapshot(raw));

        assert!(store.is_dirty());
        assert_eq!(store.len(), 1);
        // Loading never writes
        assert_eq!(store.storage().save_count(), 0);

        let id = store.tasks()[0].id;
        store.toggle_complete(id).unwrap();
        assert!(!store.is_dirty());

        let stored = snapshot::decode(store.storage().snapshot());
        assert!(!stored.repaired);
        assert_eq!(stored.tasks[0].id, id);
    }

    #[test]
    fn test_load_resets_filter() {
        let mut store = memory_store();
        store.add_task("a").unwrap();
        store.set_filter(TaskFilter::Assigned);

        let loaded = store.load().len();
        assert_eq!(loaded, 1);
        assert_eq!(store.filter(), TaskFilter::All);
    }
}
