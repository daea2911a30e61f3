//! Plan and exercise catalogs.
//!
//! The engine only sees the [`PlanCatalog`] and [`ExerciseCatalog`] traits.
//! This module also provides the built-in catalog used by the CLI.

use crate::types::*;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Supplies immutable workout plans by identifier
pub trait PlanCatalog {
    fn get_plan(&self, plan_id: &str) -> Result<WorkoutPlan>;

    fn plans(&self) -> Vec<WorkoutPlan>;
}

/// Supplies substitute candidates by muscle group
pub trait ExerciseCatalog {
    /// Exercises sharing a tag with `groups`, excluding `exclude_id`, in
    /// catalog order. The iterator is finite and consumed once.
    fn find_by_muscle_groups<'a>(
        &'a self,
        exclude_id: &str,
        groups: &[String],
    ) -> Result<Box<dyn Iterator<Item = ExerciseSummary> + 'a>>;
}

/// In-memory catalog of exercises and plans. Order is significant.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub exercises: Vec<ExerciseSummary>,
    pub plans: Vec<WorkoutPlan>,
}

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

fn exercise(id: &str, name: &str, groups: &[&str], equipment: Option<&str>) -> ExerciseSummary {
    ExerciseSummary {
        id: id.into(),
        name: name.into(),
        muscle_groups: groups.iter().map(|g| g.to_string()).collect(),
        equipment: equipment.map(Into::into),
    }
}

/// Builds the default catalog with built-in exercises and plans
pub fn build_default_catalog() -> Catalog {
    // ========================================================================
    // Exercises
    // ========================================================================

    let exercises = vec![
        exercise("barbell_squat", "Barbell Back Squat", &["quads", "glutes"], Some("barbell")),
        exercise("goblet_squat", "Goblet Squat", &["quads", "glutes"], Some("dumbbell")),
        exercise("leg_press", "Leg Press", &["quads"], Some("machine")),
        exercise(
            "bulgarian_split_squat",
            "Bulgarian Split Squat",
            &["quads", "glutes"],
            Some("dumbbell"),
        ),
        exercise(
            "romanian_deadlift",
            "Romanian Deadlift",
            &["hamstrings", "glutes", "back"],
            Some("barbell"),
        ),
        exercise("hip_thrust", "Hip Thrust", &["glutes", "hamstrings"], Some("barbell")),
        exercise(
            "bench_press",
            "Barbell Bench Press",
            &["chest", "triceps", "shoulders"],
            Some("barbell"),
        ),
        exercise(
            "dumbbell_bench_press",
            "Dumbbell Bench Press",
            &["chest", "triceps"],
            Some("dumbbell"),
        ),
        exercise("push_up", "Push-up", &["chest", "triceps", "core"], None),
        exercise("barbell_row", "Barbell Row", &["back", "biceps"], Some("barbell")),
        exercise("seated_cable_row", "Seated Cable Row", &["back", "biceps"], Some("cable")),
        exercise("lat_pulldown", "Lat Pulldown", &["back", "biceps"], Some("cable")),
        exercise("pull_up", "Pull-up", &["back", "biceps"], Some("pullup_bar")),
        exercise(
            "overhead_press",
            "Overhead Press",
            &["shoulders", "triceps"],
            Some("barbell"),
        ),
        exercise(
            "dumbbell_shoulder_press",
            "Dumbbell Shoulder Press",
            &["shoulders", "triceps"],
            Some("dumbbell"),
        ),
        exercise("hanging_knee_raise", "Hanging Knee Raise", &["core"], Some("pullup_bar")),
        exercise("dead_bug", "Dead Bug", &["core"], None),
    ];

    // ========================================================================
    // Plans
    // ========================================================================

    let prescribe = |id: &str, sets: u32, reps: u32, rest: u32| -> ExercisePrescription {
        let summary = exercises
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .unwrap_or_else(|| exercise(id, id, &[], None));
        ExercisePrescription {
            exercise_id: summary.id,
            name: summary.name,
            muscle_groups: summary.muscle_groups,
            target_sets: sets,
            target_reps: reps,
            rest_seconds: rest,
            equipment: summary.equipment,
        }
    };

    let plans = vec![
        WorkoutPlan {
            id: "full_body_a".into(),
            name: "Full Body A".into(),
            estimated_calories: Some(320),
            exercises: vec![
                prescribe("barbell_squat", 3, 8, 120),
                prescribe("bench_press", 3, 8, 120),
                prescribe("barbell_row", 3, 10, 90),
                prescribe("hanging_knee_raise", 2, 12, 60),
            ],
        },
        WorkoutPlan {
            id: "upper_body".into(),
            name: "Upper Body".into(),
            estimated_calories: None,
            exercises: vec![
                prescribe("bench_press", 4, 6, 150),
                prescribe("pull_up", 3, 8, 120),
                prescribe("overhead_press", 3, 10, 90),
                prescribe("seated_cable_row", 3, 12, 60),
            ],
        },
        WorkoutPlan {
            id: "lower_body".into(),
            name: "Lower Body".into(),
            estimated_calories: Some(380),
            exercises: vec![
                prescribe("barbell_squat", 4, 6, 150),
                prescribe("romanian_deadlift", 3, 10, 120),
                prescribe("bulgarian_split_squat", 3, 10, 90),
                prescribe("hip_thrust", 3, 12, 60),
            ],
        },
        WorkoutPlan {
            id: "quick_start".into(),
            name: "Quick Start".into(),
            estimated_calories: Some(150),
            exercises: vec![
                prescribe("push_up", 2, 15, 45),
                prescribe("goblet_squat", 2, 12, 45),
            ],
        },
    ];

    Catalog { exercises, plans }
}

impl Catalog {
    pub fn exercise(&self, id: &str) -> Option<&ExerciseSummary> {
        self.exercises.iter().find(|e| e.id == id)
    }

    /// Validate the catalog for consistency and completeness
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let mut seen = HashSet::new();
        for exercise in &self.exercises {
            if exercise.id.is_empty() {
                errors.push("Exercise has empty ID".to_string());
            }
            if !seen.insert(exercise.id.as_str()) {
                errors.push(format!("Duplicate exercise ID '{}'", exercise.id));
            }
            if exercise.name.is_empty() {
                errors.push(format!("Exercise '{}' has empty name", exercise.id));
            }
            if exercise.muscle_groups.is_empty() {
                errors.push(format!("Exercise '{}' has no muscle groups", exercise.id));
            }
        }

        let mut seen_plans = HashSet::new();
        for plan in &self.plans {
            if !seen_plans.insert(plan.id.as_str()) {
                errors.push(format!("Duplicate plan ID '{}'", plan.id));
            }
            if let Err(e) = plan.validate() {
                errors.push(e.to_string());
            }

            // Check that all referenced exercises exist
            for prescription in &plan.exercises {
                if self.exercise(&prescription.exercise_id).is_none() {
                    errors.push(format!(
                        "Plan '{}' references non-existent exercise '{}'",
                        plan.id, prescription.exercise_id
                    ));
                }
            }
        }

        errors
    }
}

impl WorkoutPlan {
    /// Check the plan can be executed by the session engine
    pub fn validate(&self) -> Result<()> {
        if self.exercises.is_empty() {
            return Err(Error::PlanEmpty(self.id.clone()));
        }

        for prescription in &self.exercises {
            if prescription.target_sets == 0 {
                return Err(Error::InvalidPrescription {
                    exercise_id: prescription.exercise_id.clone(),
                    reason: "target sets must be at least 1".into(),
                });
            }
            if prescription.target_reps == 0 {
                return Err(Error::InvalidPrescription {
                    exercise_id: prescription.exercise_id.clone(),
                    reason: "target reps must be at least 1".into(),
                });
            }
        }
        Ok(())
    }
}

impl PlanCatalog for Catalog {
    fn get_plan(&self, plan_id: &str) -> Result<WorkoutPlan> {
        self.plans
            .iter()
            .find(|p| p.id == plan_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("plan '{}'", plan_id)))
    }

    fn plans(&self) -> Vec<WorkoutPlan> {
        self.plans.clone()
    }
}

impl ExerciseCatalog for Catalog {
    fn find_by_muscle_groups<'a>(
        &'a self,
        exclude_id: &str,
        groups: &[String],
    ) -> Result<Box<dyn Iterator<Item = ExerciseSummary> + 'a>> {
        let exclude_id = exclude_id.to_string();
        let groups = groups.to_vec();

        Ok(Box::new(
            self.exercises
                .iter()
                .filter(move |e| e.id != exclude_id && e.targets_any(&groups))
                .cloned(),
        ))
    }
}
