//! Time-ordered index of tasks and subtasks with overlap detection.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;

use crate::error::{Result, StoreError};
use crate::models::{Task, TaskId};

/// Sort key: start time ascending with unscheduled items last, then id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScheduleKey {
    start: Option<NaiveDateTime>,
    id: TaskId,
}

impl Ord for ScheduleKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_start = match (self.start, other.start) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_start.then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for ScheduleKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Half-open `[start, end)` interval occupied by an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl Window {
    /// Touching windows (`self.end == other.start`) do not overlap.
    fn overlaps(&self, other: &Window) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Tasks and subtasks ordered by `(start time, id)`.
///
/// Only items with both a start time and a duration take part in conflict
/// checks. Items without them are still listed, after the scheduled ones
/// when they have no start time.
#[derive(Debug, Default, Clone)]
pub struct ScheduleIndex {
    entries: BTreeMap<ScheduleKey, Option<Window>>,
    keys: HashMap<TaskId, ScheduleKey>,
}

impl ScheduleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first indexed item whose window overlaps `task`'s, ignoring the
    /// entry that belongs to `task.id` itself.
    pub fn find_conflict(&self, task: &Task) -> Option<TaskId> {
        let window = Window::of(task)?;

        // Nothing that starts at or after our end can overlap.
        self.entries
            .iter()
            .take_while(|(key, _)| matches!(key.start, Some(start) if start < window.end))
            .find(|(key, other)| {
                key.id != task.id && other.is_some_and(|other| other.overlaps(&window))
            })
            .map(|(key, _)| key.id)
    }

    /// Index `task`, rejecting it if its window overlaps an existing one.
    ///
    /// Re-inserting an id that is already indexed replaces its old entry.
    pub fn insert(&mut self, task: &Task) -> Result<()> {
        if let Some(conflicting_id) = self.find_conflict(task) {
            return Err(StoreError::SchedulingConflict {
                id: task.id,
                conflicting_id,
            });
        }

        self.remove(task.id);
        let key = ScheduleKey {
            start: task.start_time,
            id: task.id,
        };
        self.entries.insert(key, Window::of(task));
        self.keys.insert(task.id, key);
        Ok(())
    }

    /// Drop `id` from the index. No-op if it is not indexed.
    pub fn remove(&mut self, id: TaskId) -> bool {
        match self.keys.remove(&id) {
            Some(key) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }

    /// Indexed ids in schedule order.
    pub fn all(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.entries.keys().map(|key| key.id)
    }
}

impl Window {
    fn of(task: &Task) -> Option<Self> {
        let (start, end) = task.window()?;
        Some(Self { start, end })
    }
}
