use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::task::{duration_minutes, Epic, Subtask, Task, TaskId, TaskStatus};

/// Caller-owned fields of a task, used both to create one and to replace an
/// existing one wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Defaults to `New` if not specified.
    #[serde(default)]
    pub status: TaskStatus,
    /// Duration in minutes.
    #[serde(default, with = "duration_minutes")]
    pub duration: Option<chrono::Duration>,
    #[serde(default)]
    pub start_time: Option<NaiveDateTime>,
}

impl NewTask {
    pub fn into_task(self, id: TaskId) -> Task {
        Task {
            id,
            name: self.name,
            description: self.description,
            status: self.status,
            duration: self.duration,
            start_time: self.start_time,
        }
    }
}

/// Input for creating or renaming an epic. Everything else about an epic is
/// derived from its subtasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEpic {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl NewEpic {
    pub fn into_epic(self, id: TaskId) -> Epic {
        Epic::new(id, self.name, self.description)
    }
}

/// Input for creating or replacing a subtask.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSubtask {
    #[serde(flatten)]
    pub task: NewTask,
    /// The owning epic. Must exist.
    pub epic_id: TaskId,
}

impl NewSubtask {
    pub fn into_subtask(self, id: TaskId) -> Subtask {
        Subtask {
            task: self.task.into_task(id),
            epic_id: self.epic_id,
        }
    }
}
