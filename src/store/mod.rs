//! The in-memory task store.
//!
//! [`TaskStore`] owns the task, epic and subtask maps and keeps three derived
//! views in step with them on every operation:
//!
//! - epic status and time span ([`aggregate`])
//! - the time-ordered, conflict-checked schedule ([`ScheduleIndex`])
//! - the bounded view history ([`HistoryTracker`])
//!
//! Every public operation either succeeds completely or fails without
//! changing anything. Conflict checks run before any map is touched.

pub mod aggregate;
mod history;
mod ids;
mod schedule;

use std::collections::{BTreeMap, HashSet};

use chrono::Duration;
use serde::{Deserialize, Serialize};

pub use history::{HistoryTracker, DEFAULT_HISTORY_CAPACITY};
pub use ids::IdAllocator;
pub use schedule::ScheduleIndex;

use crate::error::{Result, StoreError};
use crate::models::*;

/// Every entity plus the id counter, in a form adapters can serialize.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The id the store would assign next.
    pub next_id: TaskId,
    pub tasks: Vec<Task>,
    pub epics: Vec<Epic>,
    pub subtasks: Vec<Subtask>,
}

#[derive(Debug, Clone)]
pub struct TaskStore {
    ids: IdAllocator,
    tasks: BTreeMap<TaskId, Task>,
    epics: BTreeMap<TaskId, Epic>,
    subtasks: BTreeMap<TaskId, Subtask>,
    schedule: ScheduleIndex,
    history: HistoryTracker,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_history_capacity(capacity: usize) -> Self {
        Self {
            ids: IdAllocator::new(),
            tasks: BTreeMap::new(),
            epics: BTreeMap::new(),
            subtasks: BTreeMap::new(),
            schedule: ScheduleIndex::new(),
            history: HistoryTracker::new(capacity),
        }
    }

    // ============================================================
    // Tasks
    // ============================================================

    pub fn add_task(&mut self, input: NewTask) -> Result<Task> {
        let task = input.into_task(self.ids.peek());
        validate(&task)?;
        self.schedule.insert(&task).inspect_err(log_rejection)?;

        self.ids.next_id();
        self.tasks.insert(task.id, task.clone());
        tracing::debug!("Added task {}", task.id);
        Ok(task)
    }

    /// Look up a task and record the access in the history.
    pub fn get_task(&mut self, id: TaskId) -> Option<Task> {
        let task = self.tasks.get(&id)?.clone();
        self.history.record(id);
        Some(task)
    }

    /// Replace a stored task with `task`, matched by id.
    pub fn update_task(&mut self, task: Task) -> Result<Task> {
        if !self.tasks.contains_key(&task.id) {
            return Err(StoreError::not_found(ItemKind::Task, task.id));
        }
        validate(&task)?;
        self.schedule.insert(&task).inspect_err(log_rejection)?;

        self.tasks.insert(task.id, task.clone());
        tracing::debug!("Updated task {}", task.id);
        Ok(task)
    }

    pub fn remove_task(&mut self, id: TaskId) -> Result<Task> {
        let task = self
            .tasks
            .remove(&id)
            .ok_or_else(|| StoreError::not_found(ItemKind::Task, id))?;
        self.schedule.remove(id);
        self.history.forget(id);
        tracing::debug!("Removed task {}", id);
        Ok(task)
    }

    /// Remove every task. Returns how many were removed.
    pub fn remove_all_tasks(&mut self) -> usize {
        let removed = std::mem::take(&mut self.tasks);
        for id in removed.keys() {
            self.schedule.remove(*id);
            self.history.forget(*id);
        }
        tracing::debug!("Removed all {} tasks", removed.len());
        removed.len()
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.tasks.values().cloned().collect()
    }

    // ============================================================
    // Epics
    // ============================================================

    pub fn add_epic(&mut self, input: NewEpic) -> Epic {
        let mut epic = input.into_epic(self.ids.next_id());
        aggregate::reset(&mut epic);
        self.epics.insert(epic.id(), epic.clone());
        tracing::debug!("Added epic {}", epic.id());
        epic
    }

    /// Look up an epic and record the access in the history.
    pub fn get_epic(&mut self, id: TaskId) -> Option<Epic> {
        let epic = self.epics.get(&id)?.clone();
        self.history.record(id);
        Some(epic)
    }

    /// Replace the caller-owned fields (name, description) of a stored epic.
    ///
    /// Status, time span and the subtask list belong to the store and are
    /// kept as they are.
    pub fn update_epic(&mut self, epic: Epic) -> Result<Epic> {
        let id = epic.id();
        let stored = self
            .epics
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(ItemKind::Epic, id))?;
        stored.task.name = epic.task.name;
        stored.task.description = epic.task.description;
        tracing::debug!("Updated epic {}", id);
        Ok(stored.clone())
    }

    /// Remove an epic together with all of its subtasks.
    pub fn remove_epic(&mut self, id: TaskId) -> Result<Epic> {
        let epic = self
            .epics
            .remove(&id)
            .ok_or_else(|| StoreError::not_found(ItemKind::Epic, id))?;
        for subtask_id in &epic.subtask_ids {
            self.purge_subtask(*subtask_id);
        }
        self.history.forget(id);
        tracing::debug!(
            "Removed epic {} with {} subtasks",
            id,
            epic.subtask_ids.len()
        );
        Ok(epic)
    }

    /// Remove every epic and, with them, every subtask. Returns how many
    /// epics were removed.
    pub fn remove_all_epics(&mut self) -> usize {
        let removed = std::mem::take(&mut self.epics);
        let subtask_ids: Vec<TaskId> = self.subtasks.keys().copied().collect();
        for id in subtask_ids {
            self.purge_subtask(id);
        }
        for id in removed.keys() {
            self.history.forget(*id);
        }
        tracing::debug!("Removed all {} epics", removed.len());
        removed.len()
    }

    pub fn list_epics(&self) -> Vec<Epic> {
        self.epics.values().cloned().collect()
    }

    /// Subtasks of an epic in the order they were attached, or `None` if the
    /// epic does not exist.
    pub fn list_subtasks_of_epic(&self, epic_id: TaskId) -> Option<Vec<Subtask>> {
        let epic = self.epics.get(&epic_id)?;
        Some(
            epic.subtask_ids
                .iter()
                .filter_map(|id| self.subtasks.get(id))
                .cloned()
                .collect(),
        )
    }

    // ============================================================
    // Subtasks
    // ============================================================

    pub fn add_subtask(&mut self, input: NewSubtask) -> Result<Subtask> {
        if !self.epics.contains_key(&input.epic_id) {
            let err = StoreError::not_found(ItemKind::Epic, input.epic_id);
            log_rejection(&err);
            return Err(err);
        }
        let subtask = input.into_subtask(self.ids.peek());
        validate(&subtask.task)?;
        let epic = self
            .staged_epic(subtask.epic_id, None, Some(&subtask))
            .inspect_err(log_rejection)?;
        self.schedule
            .insert(&subtask.task)
            .inspect_err(log_rejection)?;

        let id = self.ids.next_id();
        self.subtasks.insert(id, subtask.clone());
        self.epics.insert(epic.id(), epic);
        tracing::debug!("Added subtask {} to epic {}", id, subtask.epic_id);
        Ok(subtask)
    }

    /// Look up a subtask and record the access in the history.
    pub fn get_subtask(&mut self, id: TaskId) -> Option<Subtask> {
        let subtask = self.subtasks.get(&id)?.clone();
        self.history.record(id);
        Some(subtask)
    }

    /// Replace a stored subtask with `subtask`, matched by id.
    ///
    /// If the epic changes, the subtask moves to the end of the new epic's
    /// list and both epics are recomputed.
    pub fn update_subtask(&mut self, subtask: Subtask) -> Result<Subtask> {
        let id = subtask.id();
        let previous_epic = self
            .subtasks
            .get(&id)
            .map(|stored| stored.epic_id)
            .ok_or_else(|| StoreError::not_found(ItemKind::Subtask, id))?;
        if !self.epics.contains_key(&subtask.epic_id) {
            return Err(StoreError::not_found(ItemKind::Epic, subtask.epic_id));
        }
        validate(&subtask.task)?;
        let target = self
            .staged_epic(subtask.epic_id, None, Some(&subtask))
            .inspect_err(log_rejection)?;
        let source = if previous_epic != subtask.epic_id {
            Some(self.staged_epic(previous_epic, Some(id), None)?)
        } else {
            None
        };
        self.schedule
            .insert(&subtask.task)
            .inspect_err(log_rejection)?;

        self.subtasks.insert(id, subtask.clone());
        if let Some(source) = source {
            self.epics.insert(source.id(), source);
        }
        self.epics.insert(target.id(), target);
        tracing::debug!("Updated subtask {}", id);
        Ok(subtask)
    }

    pub fn remove_subtask(&mut self, id: TaskId) -> Result<Subtask> {
        let epic = match self.subtasks.get(&id) {
            Some(subtask) => self.staged_epic(subtask.epic_id, Some(id), None)?,
            None => return Err(StoreError::not_found(ItemKind::Subtask, id)),
        };
        let subtask = self
            .purge_subtask(id)
            .ok_or_else(|| StoreError::not_found(ItemKind::Subtask, id))?;
        self.epics.insert(epic.id(), epic);
        tracing::debug!("Removed subtask {}", id);
        Ok(subtask)
    }

    /// Remove every subtask. Epics stay and fall back to the empty aggregate.
    pub fn remove_all_subtasks(&mut self) -> usize {
        let subtask_ids: Vec<TaskId> = self.subtasks.keys().copied().collect();
        for id in &subtask_ids {
            self.purge_subtask(*id);
        }
        for epic in self.epics.values_mut() {
            epic.subtask_ids.clear();
            aggregate::reset(epic);
        }
        tracing::debug!("Removed all {} subtasks", subtask_ids.len());
        subtask_ids.len()
    }

    pub fn list_subtasks(&self) -> Vec<Subtask> {
        self.subtasks.values().cloned().collect()
    }

    // ============================================================
    // Derived views
    // ============================================================

    /// Recently fetched entities, oldest first.
    pub fn list_history(&self) -> Vec<Item> {
        self.history
            .snapshot()
            .into_iter()
            .filter_map(|id| self.item(id))
            .collect()
    }

    /// Tasks and subtasks ordered by start time, then id. Items without a
    /// start time come last.
    pub fn list_prioritized(&self) -> Vec<Item> {
        self.schedule.all().filter_map(|id| self.item(id)).collect()
    }

    /// Any entity by id, without touching the history.
    pub fn item(&self, id: TaskId) -> Option<Item> {
        if let Some(task) = self.tasks.get(&id) {
            return Some(Item::Task(task.clone()));
        }
        if let Some(epic) = self.epics.get(&id) {
            return Some(Item::Epic(epic.clone()));
        }
        self.subtasks
            .get(&id)
            .map(|subtask| Item::Subtask(subtask.clone()))
    }

    // ============================================================
    // Bulk load / export
    // ============================================================

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            next_id: self.ids.peek(),
            tasks: self.list_tasks(),
            epics: self.list_epics(),
            subtasks: self.list_subtasks(),
        }
    }

    /// Rebuild a store from a snapshot: tasks, then epics, then subtasks,
    /// then one aggregation pass over every epic.
    ///
    /// Subtasks pointing at a missing epic are dropped with a warning. Epic
    /// subtask order is taken from the snapshot where it agrees with the
    /// subtasks' own `epic_id`.
    pub fn restore(snapshot: Snapshot, history_capacity: usize) -> Result<Self> {
        let mut store = Self::with_history_capacity(history_capacity);
        if snapshot.next_id > 1 {
            store.ids.observe(snapshot.next_id - 1);
        }

        for task in snapshot.tasks {
            store.claim_id(task.id)?;
            validate(&task)?;
            store.schedule.insert(&task)?;
            store.tasks.insert(task.id, task);
        }

        for epic in snapshot.epics {
            store.claim_id(epic.id())?;
            store.epics.insert(epic.id(), epic);
        }

        let mut members: BTreeMap<TaskId, Vec<TaskId>> = BTreeMap::new();
        for subtask in snapshot.subtasks {
            if !store.epics.contains_key(&subtask.epic_id) {
                tracing::warn!(
                    "Dropping subtask {}: epic {} does not exist",
                    subtask.id(),
                    subtask.epic_id
                );
                continue;
            }
            store.claim_id(subtask.id())?;
            validate(&subtask.task)?;
            store.schedule.insert(&subtask.task)?;
            members
                .entry(subtask.epic_id)
                .or_default()
                .push(subtask.id());
            store.subtasks.insert(subtask.id(), subtask);
        }

        let subtasks = &store.subtasks;
        for (epic_id, epic) in store.epics.iter_mut() {
            let linked = members.remove(epic_id).unwrap_or_default();
            let belongs: HashSet<TaskId> = linked.iter().copied().collect();
            let mut seen: HashSet<TaskId> = HashSet::with_capacity(linked.len());
            let mut ordered: Vec<TaskId> = Vec::with_capacity(linked.len());
            // Stored order first, then anything the epic did not list.
            for id in epic.subtask_ids.iter().copied().chain(linked) {
                if belongs.contains(&id) && seen.insert(id) {
                    ordered.push(id);
                }
            }
            epic.subtask_ids = ordered;

            let current: Vec<&Subtask> = epic
                .subtask_ids
                .iter()
                .filter_map(|id| subtasks.get(id))
                .collect();
            aggregate::recompute(epic, current)?;
        }

        tracing::debug!(
            "Restored {} tasks, {} epics, {} subtasks",
            store.tasks.len(),
            store.epics.len(),
            store.subtasks.len()
        );
        Ok(store)
    }

    // ============================================================
    // Internals
    // ============================================================

    fn claim_id(&mut self, id: TaskId) -> Result<()> {
        if id == 0 || self.item(id).is_some() {
            return Err(StoreError::Invalid(format!("duplicate or zero id {}", id)));
        }
        self.ids.observe(id);
        Ok(())
    }

    /// Drop a subtask from the map, the schedule and the history. Leaves the
    /// owning epic's list alone.
    fn purge_subtask(&mut self, id: TaskId) -> Option<Subtask> {
        let subtask = self.subtasks.remove(&id)?;
        self.schedule.remove(id);
        self.history.forget(id);
        Some(subtask)
    }

    /// A copy of epic `epic_id` with `removed` detached and `changed`
    /// attached (or replaced in place), its derived fields recomputed.
    /// Nothing is written back, so a failure here leaves the store as it was.
    fn staged_epic(
        &self,
        epic_id: TaskId,
        removed: Option<TaskId>,
        changed: Option<&Subtask>,
    ) -> Result<Epic> {
        let mut epic = self
            .epics
            .get(&epic_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(ItemKind::Epic, epic_id))?;
        if let Some(removed) = removed {
            epic.subtask_ids.retain(|id| *id != removed);
        }
        if let Some(subtask) = changed {
            if !epic.subtask_ids.contains(&subtask.id()) {
                epic.subtask_ids.push(subtask.id());
            }
        }

        let current: Vec<&Subtask> = epic
            .subtask_ids
            .iter()
            .filter_map(|id| match changed {
                Some(subtask) if subtask.id() == *id => Some(subtask),
                _ => self.subtasks.get(id),
            })
            .collect();
        aggregate::recompute(&mut epic, current)?;
        Ok(epic)
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(task: &Task) -> Result<()> {
    if let Some(duration) = task.duration {
        if duration < Duration::zero() {
            return Err(StoreError::Invalid(format!(
                "negative duration for item {}",
                task.id
            )));
        }
        if task.start_time.is_some() && task.end_time().is_none() {
            return Err(StoreError::Invalid(format!(
                "end time of item {} is out of range",
                task.id
            )));
        }
    }
    Ok(())
}

fn log_rejection(err: &StoreError) {
    tracing::warn!("Rejected: {}", err);
}
