//! Domain models for the task tracker.
//!
//! # Core Concepts
//!
//! - [`Task`]: A unit of work with an optional start time and duration.
//! - [`Epic`]: A group of subtasks. Its status and time span are derived from
//!   the subtasks and never set by callers.
//! - [`Subtask`]: A task owned by exactly one epic. Deleting the epic deletes it.
//! - [`Item`]: Any of the three, tagged by [`ItemKind`].
//!
//! Ids are shared across all three kinds: a task, an epic and a subtask never
//! have the same id.
//!
//! Tasks and subtasks that have both a start time and a duration occupy a
//! window on the schedule; two windows may touch but never overlap.

mod input;
mod task;

pub use input::*;
pub use task::*;
