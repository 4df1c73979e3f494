//! SQLite persistence for store snapshots.
//!
//! The store is the source of truth while the process runs; the database only
//! holds the last committed snapshot. Every save rewrites the `items` table in
//! a single transaction, so a crash mid-save leaves the previous snapshot.

mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;

use crate::models::*;
use crate::store::Snapshot;

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    /// `<platform data dir>/tracker.db`.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "task-tracker")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join("tracker.db"))
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&mut conn)
    }

    // ============================================================
    // Snapshot operations
    // ============================================================

    /// Replace the stored snapshot with `snapshot`.
    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM items", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO items
                 (id, kind, name, description, status, start_time, duration_minutes, epic_id, subtask_ids)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;

            for task in &snapshot.tasks {
                stmt.execute((
                    to_sql_id(task.id)?,
                    ItemKind::Task.as_str(),
                    &task.name,
                    &task.description,
                    task.status.as_str(),
                    task.start_time.map(format_datetime),
                    task.duration.map(|d| d.num_minutes()),
                    None::<i64>,
                    None::<String>,
                ))?;
            }

            for epic in &snapshot.epics {
                let task = &epic.task;
                stmt.execute((
                    to_sql_id(task.id)?,
                    ItemKind::Epic.as_str(),
                    &task.name,
                    &task.description,
                    task.status.as_str(),
                    task.start_time.map(format_datetime),
                    task.duration.map(|d| d.num_minutes()),
                    None::<i64>,
                    Some(serde_json::to_string(&epic.subtask_ids)?),
                ))?;
            }

            for subtask in &snapshot.subtasks {
                let task = &subtask.task;
                stmt.execute((
                    to_sql_id(task.id)?,
                    ItemKind::Subtask.as_str(),
                    &task.name,
                    &task.description,
                    task.status.as_str(),
                    task.start_time.map(format_datetime),
                    task.duration.map(|d| d.num_minutes()),
                    Some(to_sql_id(subtask.epic_id)?),
                    None::<String>,
                ))?;
            }
        }

        tx.execute(
            "INSERT INTO counters (name, value) VALUES ('next_id', ?)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            [to_sql_id(snapshot.next_id)?],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Read the stored snapshot. An empty database yields an empty snapshot.
    pub fn load_snapshot(&self) -> Result<Snapshot> {
        let conn = self.conn.lock().expect("database lock poisoned");

        let next_id: i64 = conn
            .query_row(
                "SELECT value FROM counters WHERE name = 'next_id'",
                [],
                |row| row.get(0),
            )
            .context("Failed to read id counter")?;

        let mut stmt = conn.prepare(
            "SELECT id, kind, name, description, status, start_time, duration_minutes, epic_id, subtask_ids
             FROM items ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ItemRow {
                    id: row.get(0)?,
                    kind: row.get(1)?,
                    name: row.get(2)?,
                    description: row.get(3)?,
                    status: row.get(4)?,
                    start_time: row.get(5)?,
                    duration_minutes: row.get(6)?,
                    epic_id: row.get(7)?,
                    subtask_ids: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut snapshot = Snapshot {
            next_id: from_sql_id(next_id)?,
            ..Snapshot::default()
        };
        for row in rows {
            let id = row.id;
            match row
                .into_item()
                .with_context(|| format!("Failed to decode item {}", id))?
            {
                Item::Task(task) => snapshot.tasks.push(task),
                Item::Epic(epic) => snapshot.epics.push(epic),
                Item::Subtask(subtask) => snapshot.subtasks.push(subtask),
            }
        }

        Ok(snapshot)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

struct ItemRow {
    id: i64,
    kind: String,
    name: String,
    description: String,
    status: String,
    start_time: Option<String>,
    duration_minutes: Option<i64>,
    epic_id: Option<i64>,
    subtask_ids: Option<String>,
}

impl ItemRow {
    fn into_item(self) -> Result<Item> {
        let kind = ItemKind::from_str(&self.kind)
            .ok_or_else(|| anyhow::anyhow!("Unknown item kind: {}", self.kind))?;
        let task = Task {
            id: from_sql_id(self.id)?,
            name: self.name,
            description: self.description,
            status: TaskStatus::from_str(&self.status)
                .ok_or_else(|| anyhow::anyhow!("Unknown status: {}", self.status))?,
            duration: self
                .duration_minutes
                .map(|minutes| {
                    Duration::try_minutes(minutes)
                        .ok_or_else(|| anyhow::anyhow!("Duration out of range: {}", minutes))
                })
                .transpose()?,
            start_time: self.start_time.as_deref().map(parse_datetime).transpose()?,
        };

        Ok(match kind {
            ItemKind::Task => Item::Task(task),
            ItemKind::Epic => {
                let subtask_ids = match self.subtask_ids {
                    Some(json) => serde_json::from_str(&json)?,
                    None => Vec::new(),
                };
                Item::Epic(Epic {
                    task,
                    subtask_ids,
                    end_time: None,
                })
            }
            ItemKind::Subtask => {
                let epic_id = self
                    .epic_id
                    .ok_or_else(|| anyhow::anyhow!("Subtask without epic"))?;
                Item::Subtask(Subtask {
                    task,
                    epic_id: from_sql_id(epic_id)?,
                })
            }
        })
    }
}

fn to_sql_id(id: TaskId) -> Result<i64> {
    i64::try_from(id).with_context(|| format!("Id {} does not fit in SQLite", id))
}

fn from_sql_id(id: i64) -> Result<TaskId> {
    TaskId::try_from(id).with_context(|| format!("Negative id {}", id))
}

fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .with_context(|| format!("Invalid timestamp: {}", s))
}
