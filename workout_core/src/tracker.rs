//! The set currently being performed.
//!
//! A tracker lives from the moment a set becomes active until it is
//! committed. Committing consumes it, so a frozen [`SetRecord`] can never be
//! edited through a stale tracker.

use crate::{Error, Result, SetRecord};
use chrono::{DateTime, Utc};

/// Reps a set records at minimum
pub const MIN_REPS: u32 = 1;

#[derive(Clone, Debug, PartialEq)]
pub struct SetTracker {
    exercise_id: String,
    set_index: u32,
    reps: u32,
    weight: f64,
    started_at: DateTime<Utc>,
}

impl SetTracker {
    /// Start tracking a set with the prescribed reps and the last weight used
    pub fn initialize(
        exercise_id: impl Into<String>,
        set_index: u32,
        target_reps: u32,
        previous_weight: Option<f64>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let weight = previous_weight
            .filter(|w| w.is_finite())
            .map(|w| w.max(0.0))
            .unwrap_or(0.0);

        Self {
            exercise_id: exercise_id.into(),
            set_index,
            reps: target_reps.max(MIN_REPS),
            weight,
            started_at,
        }
    }

    pub fn adjust_reps(&mut self, delta: i32) {
        let reps = (i64::from(self.reps) + i64::from(delta)).max(i64::from(MIN_REPS));
        self.reps = u32::try_from(reps).unwrap_or(u32::MAX);
        tracing::debug!("Set {} reps -> {}", self.set_index, self.reps);
    }

    /// Add `delta` to the weight, never going below zero.
    ///
    /// No rounding is applied; callers step by their own plate increment.
    pub fn adjust_weight(&mut self, delta: f64) {
        if !delta.is_finite() {
            tracing::warn!("Ignoring non-finite weight delta {}", delta);
            return;
        }
        self.weight = (self.weight + delta).max(0.0);
        tracing::debug!("Set {} weight -> {}", self.set_index, self.weight);
    }

    pub fn set_reps(&mut self, reps: u32) {
        self.reps = reps.max(MIN_REPS);
    }

    pub fn set_weight(&mut self, weight: f64) -> Result<()> {
        if !weight.is_finite() {
            return Err(Error::InvalidWeight(weight));
        }
        self.weight = weight.max(0.0);
        Ok(())
    }

    /// Freeze the set
    pub fn commit(self, completed_at: DateTime<Utc>) -> SetRecord {
        SetRecord {
            set_index: self.set_index,
            exercise_id: self.exercise_id,
            reps: self.reps,
            weight: self.weight,
            completed: true,
            started_at: self.started_at,
            completed_at,
        }
    }

    pub fn exercise_id(&self) -> &str {
        &self.exercise_id
    }

    pub fn set_index(&self) -> u32 {
        self.set_index
    }

    pub fn reps(&self) -> u32 {
        self.reps
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
