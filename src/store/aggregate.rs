//! Derives an epic's status and time span from its subtasks.

use chrono::{Duration, NaiveDateTime};

use crate::error::{Result, StoreError};
use crate::models::{Epic, Subtask, TaskStatus};

/// Rewrite the derived fields of `epic` from `subtasks`.
///
/// - status: `Done` if every subtask is done, `New` if every subtask is new,
///   `InProgress` otherwise. A mix of new and done counts as in progress.
/// - start: earliest subtask start. end: latest subtask end.
/// - duration: sum of subtask durations, independent of start and end.
///
/// With no subtasks the epic is `New`, unscheduled and zero length.
///
/// Fails with `Invalid` if the summed duration does not fit, leaving `epic`
/// untouched.
pub fn recompute<'a, I>(epic: &mut Epic, subtasks: I) -> Result<()>
where
    I: IntoIterator<Item = &'a Subtask>,
{
    let mut count = 0usize;
    let mut all_new = true;
    let mut all_done = true;
    let mut start: Option<NaiveDateTime> = None;
    let mut end: Option<NaiveDateTime> = None;
    let mut total = Duration::zero();

    for subtask in subtasks {
        let task = &subtask.task;
        count += 1;
        all_new &= task.status == TaskStatus::New;
        all_done &= task.status == TaskStatus::Done;

        if let Some(s) = task.start_time {
            start = Some(start.map_or(s, |current| current.min(s)));
        }
        if let Some(e) = task.end_time() {
            end = Some(end.map_or(e, |current| current.max(e)));
        }
        if let Some(d) = task.duration {
            total = total.checked_add(&d).ok_or_else(|| {
                StoreError::Invalid(format!(
                    "total duration of epic {} is out of range",
                    epic.id()
                ))
            })?;
        }
    }

    epic.task.status = if count == 0 || all_new {
        TaskStatus::New
    } else if all_done {
        TaskStatus::Done
    } else {
        TaskStatus::InProgress
    };
    epic.task.start_time = start;
    epic.task.duration = Some(total);
    epic.end_time = end;
    Ok(())
}

/// The derived fields of an epic without subtasks.
pub fn reset(epic: &mut Epic) {
    epic.task.status = TaskStatus::New;
    epic.task.start_time = None;
    epic.task.duration = Some(Duration::zero());
    epic.end_time = None;
}
