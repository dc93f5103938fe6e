//! Rollup of subtask progress into the parent task.

use log::debug;

use crate::error::{AppError, AppResult};
use crate::store::Store;

pub const MIN_PROGRESS: f64 = 0.0;
pub const MAX_PROGRESS: f64 = 100.0;

/// Rounds half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Arithmetic mean, or `None` for an empty set.
pub fn mean_progress(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn check_bounds(progress: f64) -> AppResult<f64> {
    if !progress.is_finite() || !(MIN_PROGRESS..=MAX_PROGRESS).contains(&progress) {
        return Err(AppError::invalid(format!(
            "Progress must be between {} and {}, got {}",
            MIN_PROGRESS, MAX_PROGRESS, progress
        )));
    }
    Ok(progress)
}

/// Applies an additive delta to a subtask's current progress.
///
/// The result has to stay inside [0, 100]; out-of-range results are rejected
/// rather than clamped so the caller sees the mistake.
pub fn apply_delta(current: f64, delta: f64) -> AppResult<f64> {
    if !delta.is_finite() {
        return Err(AppError::invalid("Progress delta must be a finite number"));
    }
    check_bounds(current + delta)
}

/// Recomputes `progress` of a task as the rounded mean of its subtasks.
///
/// Returns the written value, or `None` when the task has no subtasks, in which
/// case the task keeps whatever progress it had.
pub async fn recompute_task_progress(store: &dyn Store, task_id: &str) -> AppResult<Option<f64>> {
    let subtasks = store.find_subtasks_for_task(task_id).await?;
    let values: Vec<f64> = subtasks.iter().map(|s| s.progress).collect();
    let Some(mean) = mean_progress(&values) else {
        debug!("Task {} has no subtasks, progress left untouched", task_id);
        return Ok(None);
    };

    let rolled_up = round2(mean);
    if !store.set_task_progress(task_id, rolled_up).await? {
        return Err(AppError::NotFound("Task"));
    }
    debug!(
        "Task {} progress recomputed from {} subtasks: {}",
        task_id,
        values.len(),
        rolled_up
    );
    Ok(Some(rolled_up))
}
