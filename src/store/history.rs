//! Bounded record of recently fetched entities.
//!
//! Entries live in a slot arena linked as a doubly linked list (oldest at
//! `head`, newest at `tail`), with an id → slot map. Recording, forgetting and
//! evicting are all O(1); freed slots are reused.

use std::collections::HashMap;

use crate::models::TaskId;

/// Number of distinct entities remembered by default.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
struct Node {
    id: TaskId,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct HistoryTracker {
    capacity: usize,
    slots: Vec<Node>,
    free: Vec<usize>,
    index: HashMap<TaskId, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl HistoryTracker {
    /// A tracker remembering at most `capacity` entities. A zero capacity is
    /// bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            index: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    /// Mark `id` as the most recently accessed entity, evicting the least
    /// recent one if the tracker is over capacity.
    pub fn record(&mut self, id: TaskId) {
        if let Some(&slot) = self.index.get(&id) {
            if self.tail != Some(slot) {
                self.unlink(slot);
                self.push_back(slot);
            }
            return;
        }

        let node = Node {
            id,
            prev: None,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = node;
                slot
            }
            None => {
                self.slots.push(node);
                self.slots.len() - 1
            }
        };
        self.index.insert(id, slot);
        self.push_back(slot);

        if self.index.len() > self.capacity {
            if let Some(oldest) = self.head {
                let evicted = self.slots[oldest].id;
                self.forget(evicted);
            }
        }
    }

    /// Drop `id` from the history. No-op if it is not there.
    pub fn forget(&mut self, id: TaskId) -> bool {
        let Some(slot) = self.index.remove(&id) else {
            return false;
        };
        self.unlink(slot);
        self.free.push(slot);
        true
    }

    /// Ids from oldest to most recent.
    pub fn snapshot(&self) -> Vec<TaskId> {
        let mut ids = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            let node = &self.slots[slot];
            ids.push(node.id);
            cursor = node.next;
        }
        ids
    }

    fn push_back(&mut self, slot: usize) {
        self.slots[slot].prev = self.tail;
        self.slots[slot].next = None;
        match self.tail {
            Some(tail) => self.slots[tail].next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
    }

    fn unlink(&mut self, slot: usize) {
        let Node { prev, next, .. } = self.slots[slot];
        match prev {
            Some(prev) => self.slots[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.slots[next].prev = prev,
            None => self.tail = prev,
        }
        self.slots[slot].prev = None;
        self.slots[slot].next = None;
    }
}

impl Default for HistoryTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
