//! Error types for store operations.
//!
//! Each kind maps to a distinct outcome at the HTTP boundary:
//! - `NotFound`: 404
//! - `SchedulingConflict`: 406
//! - `Invalid`: 400

use thiserror::Error;

use crate::models::{ItemKind, TaskId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: ItemKind, id: TaskId },

    #[error("Scheduling conflict: item {id} overlaps item {conflicting_id}")]
    SchedulingConflict { id: TaskId, conflicting_id: TaskId },

    #[error("Invalid input: {0}")]
    Invalid(String),
}

impl StoreError {
    pub fn not_found(kind: ItemKind, id: TaskId) -> Self {
        Self::NotFound { kind, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::SchedulingConflict { .. })
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
