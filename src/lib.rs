//! Task tracker: tasks, epics and subtasks with derived epic status,
//! conflict-checked scheduling and a bounded view history.
//!
//! [`store::TaskStore`] is the single-owner core. [`tracker::Tracker`] shares
//! it behind one lock and optionally writes through to [`db::Database`];
//! [`api`] exposes it over HTTP.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod store;
pub mod tracker;
