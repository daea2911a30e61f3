//! Error types for the workout_core library.

use crate::types::{SessionEvent, SessionState};
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for workout_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Plan has no exercises
    #[error("Plan '{0}' has no exercises")]
    PlanEmpty(String),

    /// Exercise prescription violates its targets (sets or reps of zero)
    #[error("Invalid prescription for '{exercise_id}': {reason}")]
    InvalidPrescription { exercise_id: String, reason: String },

    /// Negative rest duration
    #[error("Invalid rest duration: {0} seconds")]
    InvalidDuration(i64),

    /// Slot index out of range, or slot has no uncommitted sets left
    #[error("Invalid slot {index}: {reason}")]
    InvalidSlot { index: usize, reason: String },

    /// Weight that is not a finite number
    #[error("Invalid weight: {0}")]
    InvalidWeight(f64),

    /// Operation not permitted in the machine's current state
    #[error("Invalid transition: {state:?} -> {event:?}")]
    InvalidTransition {
        state: SessionState,
        event: SessionEvent,
    },

    /// Plan or exercise lookup missed
    #[error("Not found: {0}")]
    NotFound(String),

    /// Exercise catalog could not be queried; the session is unchanged
    #[error("Exercise catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// Session record could not be persisted
    #[error("Write error: {0}")]
    WriteError(String),

    /// State management error
    #[error("State error: {0}")]
    State(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the caller can reasonably offer the same operation again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::CatalogUnavailable(_) | Error::WriteError(_))
    }
}
