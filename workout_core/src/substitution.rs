//! Exercise substitution.
//!
//! Candidates come from the exercise catalog in catalog order; the resolver
//! only filters. A swap changes which exercise a slot performs from now on.
//! Sets already committed stay attributed to the exercise they were done as.

use crate::catalog::ExerciseCatalog;
use crate::{Error, ExerciseSummary, Result, SessionRecord, Substitution};
use chrono::{DateTime, Utc};

pub struct SubstitutionResolver<'c> {
    catalog: &'c dyn ExerciseCatalog,
}

impl<'c> SubstitutionResolver<'c> {
    pub fn new(catalog: &'c dyn ExerciseCatalog) -> Self {
        Self { catalog }
    }

    /// Replacement candidates for `current_exercise_id`.
    ///
    /// A catalog failure is returned as a retryable error; nothing about the
    /// session is touched here.
    pub fn find_candidates(
        &self,
        current_exercise_id: &str,
        muscle_groups: &[String],
    ) -> Result<impl Iterator<Item = ExerciseSummary> + 'c> {
        let candidates = self
            .catalog
            .find_by_muscle_groups(current_exercise_id, muscle_groups)
            .map_err(|e| match e {
                Error::CatalogUnavailable(_) => e,
                other => Error::CatalogUnavailable(other.to_string()),
            })?;

        let exclude = current_exercise_id.to_string();
        let groups = muscle_groups.to_vec();
        Ok(candidates.filter(move |c| c.id != exclude && c.targets_any(&groups)))
    }
}

/// Swap the exercise of `slot_index` for `replacement`.
///
/// Targets and committed sets are kept. Fails with `InvalidSlot` if the slot
/// does not exist or all of its sets are already committed.
pub fn substitute(
    record: &mut SessionRecord,
    slot_index: usize,
    replacement: &ExerciseSummary,
    at: DateTime<Utc>,
) -> Result<()> {
    let slot_count = record.slots.len();
    let slot = record.slots.get_mut(slot_index).ok_or_else(|| Error::InvalidSlot {
        index: slot_index,
        reason: format!("session has {} slots", slot_count),
    })?;

    if slot.is_complete() {
        return Err(Error::InvalidSlot {
            index: slot_index,
            reason: "all sets already committed".into(),
        });
    }

    if slot.exercise_id == replacement.id {
        tracing::debug!("Slot {} already performs {}", slot_index, replacement.id);
        return Ok(());
    }

    tracing::info!(
        "Substituting slot {}: {} -> {} after {} sets",
        slot_index,
        slot.exercise_id,
        replacement.id,
        slot.completed_sets()
    );

    slot.substitutions.push(Substitution {
        from_exercise_id: slot.exercise_id.clone(),
        to_exercise_id: replacement.id.clone(),
        sets_completed_before: slot.completed_sets(),
        at,
    });
    slot.exercise_id = replacement.id.clone();
    slot.name = replacement.name.clone();

    Ok(())
}
