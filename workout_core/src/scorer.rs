//! Session summary metrics.
//!
//! Scoring rule:
//! - 2 points per completed minute of session time
//! - 10 points per completed exercise
//!
//! Calories are not derived from the session; they come from the plan's
//! declared estimate, falling back to a caller-supplied default.

use crate::{SessionRecord, SessionSummary};
use chrono::{DateTime, Utc};

pub const POINTS_PER_MINUTE: u64 = 2;
pub const POINTS_PER_EXERCISE: u64 = 10;

/// Compute the summary for a session finished at `completed_at`
pub fn score(
    record: &SessionRecord,
    completed_at: DateTime<Utc>,
    default_calories: u32,
) -> SessionSummary {
    let duration_seconds = u64::try_from((completed_at - record.started_at).num_seconds())
        .unwrap_or(0);
    let exercises_completed = record.completed_exercises();

    let points_earned = (duration_seconds / 60) * POINTS_PER_MINUTE
        + u64::from(exercises_completed) * POINTS_PER_EXERCISE;

    SessionSummary {
        duration_seconds,
        estimated_calories: record.plan_calories.unwrap_or(default_calories),
        points_earned,
        exercises_completed,
        sets_completed: record.completed_sets(),
    }
}
