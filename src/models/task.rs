use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Identifier shared by tasks, epics and subtasks. Unique across all three kinds.
pub type TaskId = u64;

/// A plain unit of work.
///
/// Epics and subtasks embed a `Task` for their common fields, so this is also
/// the shape every entity reports through [`Item::base`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    /// Planned length of the work, serialized as whole minutes.
    #[serde(default, with = "duration_minutes")]
    pub duration: Option<Duration>,
    #[serde(default)]
    pub start_time: Option<NaiveDateTime>,
}

impl Task {
    /// `start_time + duration`, or `None` if either is missing or the sum overflows.
    pub fn end_time(&self) -> Option<NaiveDateTime> {
        let start = self.start_time?;
        let duration = self.duration?;
        start.checked_add_signed(duration)
    }

    /// The scheduled window, if the task has both a start time and a duration.
    pub fn window(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        Some((self.start_time?, self.end_time()?))
    }
}

/// The progress status of any entity.
///
/// For epics this is derived from their subtasks and never set directly.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    New,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(Self::New),
            "IN_PROGRESS" => Some(Self::InProgress),
            "DONE" => Some(Self::Done),
            _ => None,
        }
    }
}

/// A group of subtasks whose status and time span are computed from them.
///
/// `status`, `start_time`, `duration` and `end_time` are owned by the store
/// and rewritten whenever the subtask set changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epic {
    #[serde(flatten)]
    pub task: Task,
    /// Current subtasks, in the order they were attached.
    #[serde(default)]
    pub subtask_ids: Vec<TaskId>,
    /// Latest end among the subtasks. Not `start_time + duration`: the
    /// duration is a sum and subtasks may overlap or leave gaps.
    #[serde(default)]
    pub end_time: Option<NaiveDateTime>,
}

impl Epic {
    /// An epic with no subtasks yet.
    pub fn new(id: TaskId, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            task: Task {
                id,
                name: name.into(),
                description: description.into(),
                status: TaskStatus::New,
                duration: Some(Duration::zero()),
                start_time: None,
            },
            subtask_ids: Vec::new(),
            end_time: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.task.id
    }
}

/// A task that belongs to exactly one epic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    #[serde(flatten)]
    pub task: Task,
    pub epic_id: TaskId,
}

impl Subtask {
    pub fn id(&self) -> TaskId {
        self.task.id
    }
}

/// The kind of an entity, used for dispatch and for tagging mixed lists.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    Task,
    Epic,
    Subtask,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "TASK",
            Self::Epic => "EPIC",
            Self::Subtask => "SUBTASK",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "TASK" => Some(Self::Task),
            "EPIC" => Some(Self::Epic),
            "SUBTASK" => Some(Self::Subtask),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Task => "Task",
            Self::Epic => "Epic",
            Self::Subtask => "Subtask",
        };
        f.write_str(label)
    }
}

/// Any stored entity. Serialized with a `"type"` tag so mixed lists
/// (history, prioritized) stay self-describing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Item {
    Task(Task),
    Epic(Epic),
    Subtask(Subtask),
}

impl Item {
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Task(_) => ItemKind::Task,
            Self::Epic(_) => ItemKind::Epic,
            Self::Subtask(_) => ItemKind::Subtask,
        }
    }

    /// The common fields.
    pub fn base(&self) -> &Task {
        match self {
            Self::Task(task) => task,
            Self::Epic(epic) => &epic.task,
            Self::Subtask(subtask) => &subtask.task,
        }
    }

    pub fn id(&self) -> TaskId {
        self.base().id
    }

    pub fn end_time(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Epic(epic) => epic.end_time,
            other => other.base().end_time(),
        }
    }
}

pub(crate) mod duration_minutes {
    use chrono::Duration;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => serializer.serialize_some(&duration.num_minutes()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<i64>::deserialize(deserializer)?
            .map(|minutes| {
                Duration::try_minutes(minutes)
                    .ok_or_else(|| D::Error::custom(format!("duration out of range: {minutes}")))
            })
            .transpose()
    }
}
