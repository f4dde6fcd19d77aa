//! In-memory event store with copy-on-read snapshots.
//!
//! The store is the single source of truth for tasks, families and the
//! pomodoro settings. Writers go through [`EventStore`]; the planner only ever
//! sees an immutable [`Snapshot`] taken at the start of a pass, so concurrent
//! mutations are never observed mid-pass.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::model::{Family, Task};
use crate::pomodoro::PomodoroSettings;

/// A committed change, delivered to every subscribed listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    TaskUpserted { id: String, revision: u64 },
    TaskRemoved { id: String, revision: u64 },
    FamilyUpserted { key: String, revision: u64 },
    FamilyRemoved { key: String, revision: u64 },
    PomodoroChanged { revision: u64 },
}

/// Change-notification interface for components that cache derived state.
///
/// Listeners are called after the write lock is released.
pub trait StoreListener: Send + Sync {
    fn on_change(&self, change: &StoreChange);
}

/// Immutable view of the store at one revision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub tasks: BTreeMap<String, Task>,
    #[serde(default)]
    pub families: BTreeMap<String, Family>,
    #[serde(default)]
    pub pomodoro: PomodoroSettings,
}

impl Snapshot {
    /// Build a snapshot directly from records, bypassing store validation.
    pub fn new(
        tasks: impl IntoIterator<Item = Task>,
        families: impl IntoIterator<Item = Family>,
        pomodoro: PomodoroSettings,
    ) -> Self {
        Self {
            revision: 0,
            tasks: tasks.into_iter().map(|t| (t.id.clone(), t)).collect(),
            families: families.into_iter().map(|f| (f.key.clone(), f)).collect(),
            pomodoro,
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Resolve a task's weak family reference through the family index.
    pub fn family_of(&self, task: &Task) -> Option<&Family> {
        task.family_key
            .as_deref()
            .and_then(|key| self.families.get(key))
    }

    pub fn flexible_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values().filter(|t| t.is_flexible())
    }

    pub fn fixed_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values().filter(|t| t.is_fixed())
    }
}

#[derive(Debug, Default)]
struct StoreState {
    revision: u64,
    tasks: BTreeMap<String, Task>,
    families: BTreeMap<String, Family>,
    pomodoro: PomodoroSettings,
}

impl StoreState {
    fn bump(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    /// Every `depends_on` id of `task` must exist in the store or in `batch`.
    fn check_references(&self, task: &Task, batch: &BTreeMap<String, Task>) -> Result<()> {
        for dep in &task.depends_on {
            let known = dep.task_id == task.id
                || self.tasks.contains_key(&dep.task_id)
                || batch.contains_key(&dep.task_id);
            if !known {
                return Err(CoreError::Reference {
                    task_id: task.id.clone(),
                    missing: dep.task_id.clone(),
                });
            }
        }
        Ok(())
    }

    fn dependents_of(&self, id: &str) -> Option<&Task> {
        self.tasks
            .values()
            .find(|t| t.id != id && t.depends_on.iter().any(|d| d.task_id == id))
    }
}

/// Thread-safe store of tasks and families.
#[derive(Default)]
pub struct EventStore {
    state: RwLock<StoreState>,
    listeners: RwLock<Vec<Arc<dyn StoreListener>>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from a snapshot (e.g. one loaded from disk).
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let store = Self::new();
        for family in snapshot.families.into_values() {
            store.upsert_family(family)?;
        }
        store.set_pomodoro_settings(snapshot.pomodoro)?;
        store.import(snapshot.tasks.into_values())?;
        Ok(store)
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, changes: &[StoreChange]) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for change in changes {
            debug!(?change, "store change");
            for listener in &listeners {
                listener.on_change(change);
            }
        }
    }

    /// Register a listener for committed changes.
    pub fn subscribe(&self, listener: Arc<dyn StoreListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    pub fn revision(&self) -> u64 {
        self.read().revision
    }

    /// Insert or replace a task by id.
    ///
    /// # Errors
    /// `Validation` for malformed records, `Reference` when a dependency names
    /// an unknown task.
    pub fn upsert(&self, task: Task) -> Result<()> {
        task.validate()?;
        let change = {
            let mut state = self.write();
            state.check_references(&task, &BTreeMap::new())?;
            let revision = state.bump();
            let id = task.id.clone();
            state.tasks.insert(id.clone(), task);
            StoreChange::TaskUpserted { id, revision }
        };
        self.notify(&[change]);
        Ok(())
    }

    /// Insert a new task, failing if the id is taken.
    pub fn insert(&self, task: Task) -> Result<()> {
        if self.read().tasks.contains_key(&task.id) {
            return Err(CoreError::DuplicateId(task.id));
        }
        self.upsert(task)
    }

    /// Atomically upsert a batch. References may point inside the batch, so
    /// feeds can deliver tasks in any order.
    pub fn import(&self, tasks: impl IntoIterator<Item = Task>) -> Result<usize> {
        let batch: BTreeMap<String, Task> = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        for task in batch.values() {
            task.validate()?;
        }

        let changes = {
            let mut state = self.write();
            for task in batch.values() {
                state.check_references(task, &batch)?;
            }
            let mut changes = Vec::with_capacity(batch.len());
            for (id, task) in batch {
                let revision = state.bump();
                state.tasks.insert(id.clone(), task);
                changes.push(StoreChange::TaskUpserted { id, revision });
            }
            changes
        };
        let count = changes.len();
        self.notify(&changes);
        Ok(count)
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.read().tasks.get(id).cloned()
    }

    pub fn list_all(&self) -> Vec<Task> {
        self.read().tasks.values().cloned().collect()
    }

    /// Remove a task.
    ///
    /// # Errors
    /// `NotFound` for unknown ids, `Reference` while another task still
    /// depends on it.
    pub fn remove(&self, id: &str) -> Result<Task> {
        let (task, change) = {
            let mut state = self.write();
            if !state.tasks.contains_key(id) {
                return Err(CoreError::NotFound(format!("task '{id}'")));
            }
            if let Some(dependent) = state.dependents_of(id) {
                return Err(CoreError::Reference {
                    task_id: dependent.id.clone(),
                    missing: id.to_string(),
                });
            }
            let revision = state.bump();
            let task = state
                .tasks
                .remove(id)
                .ok_or_else(|| CoreError::NotFound(format!("task '{id}'")))?;
            (task, StoreChange::TaskRemoved { id: id.to_string(), revision })
        };
        self.notify(&[change]);
        Ok(task)
    }

    pub fn upsert_family(&self, family: Family) -> Result<()> {
        family.validate()?;
        let change = {
            let mut state = self.write();
            let revision = state.bump();
            let key = family.key.clone();
            state.families.insert(key.clone(), family);
            StoreChange::FamilyUpserted { key, revision }
        };
        self.notify(&[change]);
        Ok(())
    }

    pub fn get_family(&self, key: &str) -> Option<Family> {
        self.read().families.get(key).cloned()
    }

    pub fn list_families(&self) -> Vec<Family> {
        self.read().families.values().cloned().collect()
    }

    /// Remove a family. Tasks keep their (now dangling) weak `family_key`,
    /// which the planner treats as "no family".
    pub fn remove_family(&self, key: &str) -> Result<Family> {
        let (family, change) = {
            let mut state = self.write();
            let family = state
                .families
                .remove(key)
                .ok_or_else(|| CoreError::NotFound(format!("family '{key}'")))?;
            let revision = state.bump();
            (family, StoreChange::FamilyRemoved { key: key.to_string(), revision })
        };
        self.notify(&[change]);
        Ok(family)
    }

    pub fn set_pomodoro_settings(&self, settings: PomodoroSettings) -> Result<()> {
        settings.validate()?;
        let change = {
            let mut state = self.write();
            state.pomodoro = settings;
            StoreChange::PomodoroChanged { revision: state.bump() }
        };
        self.notify(&[change]);
        Ok(())
    }

    pub fn pomodoro_settings(&self) -> PomodoroSettings {
        self.read().pomodoro
    }

    /// Copy the current state into an immutable snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        let state = self.read();
        Arc::new(Snapshot {
            revision: state.revision,
            tasks: state.tasks.clone(),
            families: state.families.clone(),
            pomodoro: state.pomodoro,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dependency;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<StoreChange>>,
    }

    impl StoreListener for Recorder {
        fn on_change(&self, change: &StoreChange) {
            self.seen.lock().unwrap().push(change.clone());
        }
    }

    #[test]
    fn upsert_get_list_remove() {
        let store = EventStore::new();
        store.upsert(Task::flexible("a", "A", 30)).unwrap();
        store.upsert(Task::flexible("b", "B", 45)).unwrap();

        assert_eq!(store.get("a").unwrap().duration_min, 30);
        assert_eq!(store.list_all().len(), 2);

        store.upsert(Task::flexible("a", "A2", 60)).unwrap();
        assert_eq!(store.list_all().len(), 2);
        assert_eq!(store.get("a").unwrap().title, "A2");

        store.remove("a").unwrap();
        assert!(store.get("a").is_none());
        assert!(matches!(store.remove("a"), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn insert_rejects_duplicate_id() {
        let store = EventStore::new();
        store.insert(Task::flexible("a", "A", 30)).unwrap();
        assert!(matches!(
            store.insert(Task::flexible("a", "A", 30)),
            Err(CoreError::DuplicateId(id)) if id == "a"
        ));
    }

    #[test]
    fn dangling_dependency_is_reference_error() {
        let store = EventStore::new();
        let task = Task::flexible("b", "B", 30).depending_on(Dependency::finish_to_start("ghost", 0));
        match store.upsert(task) {
            Err(CoreError::Reference { task_id, missing }) => {
                assert_eq!(task_id, "b");
                assert_eq!(missing, "ghost");
            }
            other => panic!("expected reference error, got {other:?}"),
        }
        assert!(store.list_all().is_empty());
    }

    #[test]
    fn cannot_remove_a_predecessor() {
        let store = EventStore::new();
        store.upsert(Task::flexible("a", "A", 30)).unwrap();
        store
            .upsert(Task::flexible("b", "B", 30).depending_on(Dependency::finish_to_start("a", 0)))
            .unwrap();
        assert!(matches!(store.remove("a"), Err(CoreError::Reference { .. })));
    }

    #[test]
    fn import_allows_forward_references_within_batch() {
        let store = EventStore::new();
        let count = store
            .import(vec![
                Task::flexible("b", "B", 30).depending_on(Dependency::finish_to_start("a", 0)),
                Task::flexible("a", "A", 30),
            ])
            .unwrap();
        assert_eq!(count, 2);

        let err = store
            .import(vec![Task::flexible("c", "C", 30).depending_on(Dependency::finish_to_start("zz", 0))])
            .unwrap_err();
        assert!(matches!(err, CoreError::Reference { .. }));
        assert!(store.get("c").is_none());
    }

    #[test]
    fn listeners_receive_changes() {
        let store = EventStore::new();
        let recorder = Arc::new(Recorder::default());
        store.subscribe(recorder.clone());

        store.upsert(Task::flexible("a", "A", 30)).unwrap();
        store.upsert_family(Family::new("study", "Study")).unwrap();
        store.remove("a").unwrap();

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(matches!(&seen[0], StoreChange::TaskUpserted { id, revision: 1 } if id == "a"));
        assert!(matches!(&seen[2], StoreChange::TaskRemoved { revision: 3, .. }));
    }

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let store = EventStore::new();
        store.upsert(Task::flexible("a", "A", 30)).unwrap();
        let snapshot = store.snapshot();

        store.upsert(Task::flexible("b", "B", 30)).unwrap();
        assert_eq!(snapshot.tasks.len(), 1);
        assert_eq!(snapshot.revision, 1);
        assert_eq!(store.snapshot().tasks.len(), 2);
    }

    #[test]
    fn family_lookup_through_index() {
        let store = EventStore::new();
        store.upsert_family(Family::new("health", "Health")).unwrap();
        store.upsert(Task::flexible("run", "Run", 30).with_family("health")).unwrap();
        store.upsert(Task::flexible("x", "X", 30).with_family("unknown")).unwrap();

        let snapshot = store.snapshot();
        let run = snapshot.task("run").unwrap();
        assert_eq!(snapshot.family_of(run).unwrap().name, "Health");
        assert!(snapshot.family_of(snapshot.task("x").unwrap()).is_none());
    }
}
