use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::error::StoreError;
use crate::models::*;
use crate::tracker::{Tracker, TrackerError};

// ============================================================
// Error Handling
// ============================================================

/// Map a tracker error to a response.
///
/// Store errors are caused by the request and are returned as-is: unknown ids
/// are 404, overlapping schedule windows are 406, malformed values are 400.
/// Persistence failures are logged in full and the client only sees a
/// generic message.
fn tracker_error(e: TrackerError) -> (StatusCode, String) {
    match e {
        TrackerError::Store(err) => {
            let status = match &err {
                StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                StoreError::SchedulingConflict { .. } => StatusCode::NOT_ACCEPTABLE,
                StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
            };
            tracing::warn!("Request rejected: {}", err);
            (status, err.to_string())
        }
        TrackerError::Persistence(err) => {
            tracing::error!("Internal error: {:#}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

fn not_found(kind: ItemKind) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("{} not found", kind))
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Tasks
// ============================================================

pub async fn list_tasks(State(tracker): State<Tracker>) -> Json<Vec<Task>> {
    Json(tracker.list_tasks())
}

pub async fn get_task(
    State(tracker): State<Tracker>,
    Path(id): Path<TaskId>,
) -> Result<Json<Task>, (StatusCode, String)> {
    tracker
        .get_task(id)
        .map(Json)
        .ok_or_else(|| not_found(ItemKind::Task))
}

pub async fn create_task(
    State(tracker): State<Tracker>,
    Json(input): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), (StatusCode, String)> {
    tracker
        .add_task(input)
        .map(|t| (StatusCode::CREATED, Json(t)))
        .map_err(tracker_error)
}

pub async fn update_task(
    State(tracker): State<Tracker>,
    Path(id): Path<TaskId>,
    Json(input): Json<NewTask>,
) -> Result<Json<Task>, (StatusCode, String)> {
    tracker
        .update_task(input.into_task(id))
        .map(Json)
        .map_err(tracker_error)
}

pub async fn delete_task(
    State(tracker): State<Tracker>,
    Path(id): Path<TaskId>,
) -> Result<StatusCode, (StatusCode, String)> {
    tracker
        .remove_task(id)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(tracker_error)
}

pub async fn delete_all_tasks(
    State(tracker): State<Tracker>,
) -> Result<StatusCode, (StatusCode, String)> {
    tracker
        .remove_all_tasks()
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(tracker_error)
}

// ============================================================
// Epics
// ============================================================

pub async fn list_epics(State(tracker): State<Tracker>) -> Json<Vec<Epic>> {
    Json(tracker.list_epics())
}

pub async fn get_epic(
    State(tracker): State<Tracker>,
    Path(id): Path<TaskId>,
) -> Result<Json<Epic>, (StatusCode, String)> {
    tracker
        .get_epic(id)
        .map(Json)
        .ok_or_else(|| not_found(ItemKind::Epic))
}

pub async fn create_epic(
    State(tracker): State<Tracker>,
    Json(input): Json<NewEpic>,
) -> Result<(StatusCode, Json<Epic>), (StatusCode, String)> {
    tracker
        .add_epic(input)
        .map(|e| (StatusCode::CREATED, Json(e)))
        .map_err(tracker_error)
}

/// Rename an epic. Its status and schedule stay derived from its subtasks.
pub async fn update_epic(
    State(tracker): State<Tracker>,
    Path(id): Path<TaskId>,
    Json(input): Json<NewEpic>,
) -> Result<Json<Epic>, (StatusCode, String)> {
    tracker
        .update_epic(input.into_epic(id))
        .map(Json)
        .map_err(tracker_error)
}

pub async fn delete_epic(
    State(tracker): State<Tracker>,
    Path(id): Path<TaskId>,
) -> Result<StatusCode, (StatusCode, String)> {
    tracker
        .remove_epic(id)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(tracker_error)
}

pub async fn delete_all_epics(
    State(tracker): State<Tracker>,
) -> Result<StatusCode, (StatusCode, String)> {
    tracker
        .remove_all_epics()
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(tracker_error)
}

pub async fn list_epic_subtasks(
    State(tracker): State<Tracker>,
    Path(id): Path<TaskId>,
) -> Result<Json<Vec<Subtask>>, (StatusCode, String)> {
    tracker
        .list_subtasks_of_epic(id)
        .map(Json)
        .ok_or_else(|| not_found(ItemKind::Epic))
}

// ============================================================
// Subtasks
// ============================================================

pub async fn list_subtasks(State(tracker): State<Tracker>) -> Json<Vec<Subtask>> {
    Json(tracker.list_subtasks())
}

pub async fn get_subtask(
    State(tracker): State<Tracker>,
    Path(id): Path<TaskId>,
) -> Result<Json<Subtask>, (StatusCode, String)> {
    tracker
        .get_subtask(id)
        .map(Json)
        .ok_or_else(|| not_found(ItemKind::Subtask))
}

pub async fn create_subtask(
    State(tracker): State<Tracker>,
    Json(input): Json<NewSubtask>,
) -> Result<(StatusCode, Json<Subtask>), (StatusCode, String)> {
    tracker
        .add_subtask(input)
        .map(|s| (StatusCode::CREATED, Json(s)))
        .map_err(tracker_error)
}

pub async fn update_subtask(
    State(tracker): State<Tracker>,
    Path(id): Path<TaskId>,
    Json(input): Json<NewSubtask>,
) -> Result<Json<Subtask>, (StatusCode, String)> {
    tracker
        .update_subtask(input.into_subtask(id))
        .map(Json)
        .map_err(tracker_error)
}

pub async fn delete_subtask(
    State(tracker): State<Tracker>,
    Path(id): Path<TaskId>,
) -> Result<StatusCode, (StatusCode, String)> {
    tracker
        .remove_subtask(id)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(tracker_error)
}

pub async fn delete_all_subtasks(
    State(tracker): State<Tracker>,
) -> Result<StatusCode, (StatusCode, String)> {
    tracker
        .remove_all_subtasks()
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(tracker_error)
}

// ============================================================
// Views
// ============================================================

/// Recently fetched entities, oldest first.
pub async fn history(State(tracker): State<Tracker>) -> Json<Vec<Item>> {
    Json(tracker.list_history())
}

/// Tasks and subtasks in schedule order.
pub async fn prioritized(State(tracker): State<Tracker>) -> Json<Vec<Item>> {
    Json(tracker.list_prioritized())
}
