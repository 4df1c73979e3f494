//! Runtime configuration loaded from environment variables.

use std::path::PathBuf;

use crate::store::DEFAULT_HISTORY_CAPACITY;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Address to bind (from TRACKER_HOST)
    pub host: String,
    /// Port for the HTTP API (from TRACKER_PORT)
    pub port: u16,
    /// Database file (from TRACKER_DB). `None` means the platform default.
    pub db_path: Option<PathBuf>,
    /// Keep everything in memory, no database (from TRACKER_IN_MEMORY)
    pub in_memory: bool,
    /// Number of entities remembered in the view history (from TRACKER_HISTORY_CAPACITY)
    pub history_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let host = lookup("TRACKER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = lookup("TRACKER_PORT")
            .and_then(|s| s.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let db_path = lookup("TRACKER_DB")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let in_memory = lookup("TRACKER_IN_MEMORY")
            .map(|s| matches!(s.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let history_capacity = lookup("TRACKER_HISTORY_CAPACITY")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_HISTORY_CAPACITY);

        Self {
            host,
            port,
            db_path,
            in_memory,
            history_capacity,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
