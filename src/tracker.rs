//! Shared handle to the store for the HTTP server and the CLI.
//!
//! [`Tracker`] wraps one [`TaskStore`] behind a single mutex so every
//! operation, including multi-step ones like cascading epic removal, runs as
//! one critical section. When a [`Database`] is attached, the full snapshot is
//! written after each successful mutation while the lock is still held, and a
//! failed write undoes the mutation.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::db::Database;
use crate::error::StoreError;
use crate::models::*;
use crate::store::{Snapshot, TaskStore};

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;

#[derive(Clone)]
pub struct Tracker {
    store: Arc<Mutex<TaskStore>>,
    db: Option<Database>,
}

impl Tracker {
    /// A tracker that keeps everything in memory.
    pub fn in_memory(history_capacity: usize) -> Self {
        Self {
            store: Arc::new(Mutex::new(TaskStore::with_history_capacity(
                history_capacity,
            ))),
            db: None,
        }
    }

    /// Load the persisted snapshot from `db` and write through to it from now on.
    pub fn open(db: Database, history_capacity: usize) -> anyhow::Result<Self> {
        let snapshot = db.load_snapshot()?;
        let store = TaskStore::restore(snapshot, history_capacity)?;
        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            db: Some(db),
        })
    }

    fn lock(&self) -> MutexGuard<'_, TaskStore> {
        self.store.lock().expect("task store lock poisoned")
    }

    /// Run a mutation and persist the result if it succeeded.
    ///
    /// If the save fails the store is put back as it was before `op`, so
    /// memory never runs ahead of the database.
    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut TaskStore) -> Result<T, StoreError>,
    ) -> TrackerResult<T> {
        let mut store = self.lock();
        let Some(db) = &self.db else {
            return Ok(op(&mut store)?);
        };

        let previous = store.clone();
        let value = op(&mut store)?;
        if let Err(err) = db.save_snapshot(&store.snapshot()) {
            tracing::error!("Save failed, rolling back: {:#}", err);
            *store = previous;
            return Err(err.into());
        }
        Ok(value)
    }

    // ============================================================
    // Tasks
    // ============================================================

    pub fn add_task(&self, input: NewTask) -> TrackerResult<Task> {
        self.mutate(|store| store.add_task(input))
    }

    pub fn get_task(&self, id: TaskId) -> Option<Task> {
        self.lock().get_task(id)
    }

    pub fn update_task(&self, task: Task) -> TrackerResult<Task> {
        self.mutate(|store| store.update_task(task))
    }

    pub fn remove_task(&self, id: TaskId) -> TrackerResult<Task> {
        self.mutate(|store| store.remove_task(id))
    }

    pub fn remove_all_tasks(&self) -> TrackerResult<usize> {
        self.mutate(|store| Ok(store.remove_all_tasks()))
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.lock().list_tasks()
    }

    // ============================================================
    // Epics
    // ============================================================

    pub fn add_epic(&self, input: NewEpic) -> TrackerResult<Epic> {
        self.mutate(|store| Ok(store.add_epic(input)))
    }

    pub fn get_epic(&self, id: TaskId) -> Option<Epic> {
        self.lock().get_epic(id)
    }

    pub fn update_epic(&self, epic: Epic) -> TrackerResult<Epic> {
        self.mutate(|store| store.update_epic(epic))
    }

    pub fn remove_epic(&self, id: TaskId) -> TrackerResult<Epic> {
        self.mutate(|store| store.remove_epic(id))
    }

    pub fn remove_all_epics(&self) -> TrackerResult<usize> {
        self.mutate(|store| Ok(store.remove_all_epics()))
    }

    pub fn list_epics(&self) -> Vec<Epic> {
        self.lock().list_epics()
    }

    pub fn list_subtasks_of_epic(&self, epic_id: TaskId) -> Option<Vec<Subtask>> {
        self.lock().list_subtasks_of_epic(epic_id)
    }

    // ============================================================
    // Subtasks
    // ============================================================

    pub fn add_subtask(&self, input: NewSubtask) -> TrackerResult<Subtask> {
        self.mutate(|store| store.add_subtask(input))
    }

    pub fn get_subtask(&self, id: TaskId) -> Option<Subtask> {
        self.lock().get_subtask(id)
    }

    pub fn update_subtask(&self, subtask: Subtask) -> TrackerResult<Subtask> {
        self.mutate(|store| store.update_subtask(subtask))
    }

    pub fn remove_subtask(&self, id: TaskId) -> TrackerResult<Subtask> {
        self.mutate(|store| store.remove_subtask(id))
    }

    pub fn remove_all_subtasks(&self) -> TrackerResult<usize> {
        self.mutate(|store| Ok(store.remove_all_subtasks()))
    }

    pub fn list_subtasks(&self) -> Vec<Subtask> {
        self.lock().list_subtasks()
    }

    // ============================================================
    // Views
    // ============================================================

    pub fn list_history(&self) -> Vec<Item> {
        self.lock().list_history()
    }

    pub fn list_prioritized(&self) -> Vec<Item> {
        self.lock().list_prioritized()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }
}
