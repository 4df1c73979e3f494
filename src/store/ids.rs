use crate::models::TaskId;

/// Hands out ids starting at 1. Ids are never reused, even after deletion.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: TaskId,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> TaskId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Make sure `id` is never issued. Used when loading entities whose ids
    /// were assigned in an earlier run.
    pub fn observe(&mut self, id: TaskId) {
        if id >= self.next {
            self.next = id + 1;
        }
    }

    /// The id the next call to [`next_id`](Self::next_id) will return.
    pub fn peek(&self) -> TaskId {
        self.next
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
