//! Core domain types for the workout session engine.
//!
//! This module defines the fundamental types used throughout the system:
//! - Plans and exercise prescriptions (supplied by catalogs, never mutated)
//! - Set and session records (owned by the state machine)
//! - The session state tag and its transition table
//! - Session summaries as written to the persistence store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Plan Types
// ============================================================================

/// One exercise entry of a plan with its targets
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExercisePrescription {
    pub exercise_id: String,
    pub name: String,
    pub muscle_groups: Vec<String>,
    pub target_sets: u32,
    pub target_reps: u32,
    pub rest_seconds: u32,
    pub equipment: Option<String>,
}

/// An ordered list of exercise prescriptions
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutPlan {
    pub id: String,
    pub name: String,
    pub estimated_calories: Option<u32>,
    pub exercises: Vec<ExercisePrescription>,
}

impl WorkoutPlan {
    /// Total number of sets across all exercises
    pub fn total_sets(&self) -> u32 {
        self.exercises.iter().map(|e| e.target_sets).sum()
    }
}

/// An exercise as listed by the exercise catalog
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseSummary {
    pub id: String,
    pub name: String,
    pub muscle_groups: Vec<String>,
    pub equipment: Option<String>,
}

impl ExerciseSummary {
    /// Whether this exercise shares at least one muscle group with `groups`
    pub fn targets_any(&self, groups: &[String]) -> bool {
        self.muscle_groups.iter().any(|g| groups.contains(g))
    }
}

// ============================================================================
// Session Records
// ============================================================================

/// A committed set. Frozen once it lands in a slot.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SetRecord {
    pub set_index: u32,
    /// Exercise the set was performed as; kept even if the slot is later substituted
    pub exercise_id: String,
    pub reps: u32,
    pub weight: f64,
    pub completed: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// A recorded swap of the exercise in a slot
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Substitution {
    pub from_exercise_id: String,
    pub to_exercise_id: String,
    pub sets_completed_before: u32,
    pub at: DateTime<Utc>,
}

/// A position in the plan's exercise sequence
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseSlot {
    /// Prescription as supplied by the plan
    pub prescription: ExercisePrescription,
    pub exercise_id: String,
    pub name: String,
    pub substitutions: Vec<Substitution>,
    pub sets: Vec<SetRecord>,
}

impl ExerciseSlot {
    pub fn new(prescription: ExercisePrescription) -> Self {
        Self {
            exercise_id: prescription.exercise_id.clone(),
            name: prescription.name.clone(),
            prescription,
            substitutions: Vec::new(),
            sets: Vec::new(),
        }
    }

    pub fn completed_sets(&self) -> u32 {
        self.sets.iter().filter(|s| s.completed).count() as u32
    }

    pub fn remaining_sets(&self) -> u32 {
        self.prescription
            .target_sets
            .saturating_sub(self.completed_sets())
    }

    pub fn is_complete(&self) -> bool {
        self.remaining_sets() == 0
    }

    /// Whether the slot's exercise differs from the plan's original
    pub fn is_substituted(&self) -> bool {
        self.exercise_id != self.prescription.exercise_id
    }
}

/// Current (exercise index, set index) of a session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SessionPosition {
    pub exercise_index: usize,
    pub set_index: u32,
}

/// The record of one engine run
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub plan_id: String,
    pub plan_calories: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub slots: Vec<ExerciseSlot>,
    pub position: SessionPosition,
    pub state: SessionState,
    pub accumulated_rest_seconds: u32,
}

impl SessionRecord {
    pub fn new(plan: &WorkoutPlan, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            plan_id: plan.id.clone(),
            plan_calories: plan.estimated_calories,
            started_at,
            completed_at: None,
            slots: plan.exercises.iter().cloned().map(ExerciseSlot::new).collect(),
            position: SessionPosition::default(),
            state: SessionState::NotStarted,
            accumulated_rest_seconds: 0,
        }
    }

    pub fn current_slot(&self) -> Option<&ExerciseSlot> {
        self.slots.get(self.position.exercise_index)
    }

    pub fn completed_exercises(&self) -> u32 {
        self.slots.iter().filter(|s| s.is_complete()).count() as u32
    }

    pub fn completed_sets(&self) -> u32 {
        self.slots.iter().map(|s| s.completed_sets()).sum()
    }
}

/// Metrics computed when the plan is exhausted
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSummary {
    pub duration_seconds: u64,
    pub estimated_calories: u32,
    pub points_earned: u64,
    pub exercises_completed: u32,
    pub sets_completed: u32,
}

/// What the persistence store receives at the end of a session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CompletedSession {
    pub record: SessionRecord,
    pub summary: SessionSummary,
}

// ============================================================================
// Session State Machine Tags
// ============================================================================

/// State tag of a session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    ExerciseActive,
    SetActive,
    Resting,
    SessionCompleted,
    Abandoned,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::SessionCompleted | SessionState::Abandoned)
    }
}

/// Where a confirmed set leads
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Followup {
    Rest,
    NextExercise,
    Finish,
}

/// Inputs to the session transition table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Start,
    BeginSet,
    EditSet,
    ConfirmSet(Followup),
    RestControl,
    EndRest,
    Substitute,
    Abandon,
}

impl SessionState {
    /// Compute the state reached by applying `event`, or fail if the
    /// combination is not part of the session lifecycle.
    pub fn transition(self, event: SessionEvent) -> crate::Result<SessionState> {
        use SessionEvent::*;
        use SessionState::*;

        let next = match (self, event) {
            (NotStarted, Start) => ExerciseActive,
            (ExerciseActive, BeginSet) => SetActive,
            (SetActive, EditSet) => SetActive,
            (SetActive, ConfirmSet(Followup::Rest)) => Resting,
            (SetActive, ConfirmSet(Followup::NextExercise)) => ExerciseActive,
            (SetActive, ConfirmSet(Followup::Finish)) => SessionCompleted,
            (Resting, RestControl) => Resting,
            (Resting, EndRest) => SetActive,
            (ExerciseActive, Substitute) => ExerciseActive,
            (SetActive, Substitute) => SetActive,
            (s, Abandon) if !s.is_terminal() => Abandoned,
            _ => {
                return Err(crate::Error::InvalidTransition {
                    state: self,
                    event,
                })
            }
        };

        Ok(next)
    }
}
