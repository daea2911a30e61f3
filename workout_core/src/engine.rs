//! Session state machine driving a user through a workout plan.
//!
//! The machine owns the [`SessionRecord`] of the running session together
//! with the active [`SetTracker`] or [`RestTimer`]. Every operation first
//! checks the transition table in [`SessionState::transition`]; a rejected
//! operation leaves the machine exactly as it was.
//!
//! ## Sequencing rules
//!
//! 1. Confirming a set with sets left in the exercise starts a rest.
//! 2. Confirming the last set of an exercise moves straight to the next
//!    exercise; there is no rest between exercises.
//! 3. Confirming the last set of the last exercise scores the session and
//!    writes it to the store.

use crate::catalog::{ExerciseCatalog, PlanCatalog};
use crate::clock::{Clock, SystemClock};
use crate::store::SessionStore;
use crate::substitution::{self, SubstitutionResolver};
use crate::timer::RestTimer;
use crate::tracker::SetTracker;
use crate::{
    scorer, CompletedSession, Error, ExerciseSlot, ExerciseSummary, Followup, Result,
    SessionEvent, SessionPosition, SessionRecord, SessionState, SessionSummary, WorkoutPlan,
};

/// Tunables for the engine
#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    /// Calories reported when the plan declares no estimate
    pub default_calories: u32,
    /// Attempts at the completion write. Values below 2 are raised to 2 so
    /// a failed write is always retried once.
    pub write_attempts: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_calories: 300,
            write_attempts: 2,
        }
    }
}

/// What happened after a set was confirmed
#[derive(Clone, Debug, PartialEq)]
pub enum SetOutcome {
    Resting { rest_seconds: u32 },
    NextExercise { exercise_index: usize },
    Completed(SessionSummary),
}

/// Result of one scheduler tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestTick {
    /// Not resting, or the timer is paused
    Idle,
    Counting { remaining_seconds: u32 },
    /// The rest ran out and the next set is active
    Finished,
}

pub struct SessionStateMachine<S: SessionStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
    settings: EngineSettings,
    state: SessionState,
    record: Option<SessionRecord>,
    tracker: Option<SetTracker>,
    timer: Option<RestTimer>,
    summary: Option<SessionSummary>,
    unsaved: Option<CompletedSession>,
}

impl<S: SessionStore> SessionStateMachine<S> {
    pub fn new(store: S, settings: EngineSettings) -> Self {
        Self::with_clock(store, SystemClock, settings)
    }
}

impl<S: SessionStore, C: Clock> SessionStateMachine<S, C> {
    pub fn with_clock(store: S, clock: C, settings: EngineSettings) -> Self {
        Self {
            store,
            clock,
            settings,
            state: SessionState::NotStarted,
            record: None,
            tracker: None,
            timer: None,
            summary: None,
            unsaved: None,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Begin `plan` at its first set.
    ///
    /// A finished or abandoned session is cleared first; a session whose
    /// completion write is still pending is not.
    pub fn start(&mut self, plan: WorkoutPlan) -> Result<()> {
        if self.state.is_terminal() {
            self.clear_finished()?;
        }
        self.state.transition(SessionEvent::Start)?;
        plan.validate()?;

        let record = SessionRecord::new(&plan, self.clock.now());
        tracing::info!(
            "Starting session {} for plan {} ({} exercises, {} sets)",
            record.id,
            plan.id,
            plan.exercises.len(),
            plan.total_sets()
        );

        self.record = Some(record);
        self.summary = None;
        self.apply(SessionEvent::Start)?;
        self.begin_set()
    }

    /// Load `plan_id` from the catalog and start it
    pub fn start_from_catalog(&mut self, catalog: &dyn PlanCatalog, plan_id: &str) -> Result<()> {
        let plan = catalog.get_plan(plan_id)?;
        self.start(plan)
    }

    /// Drop the session without persisting anything
    pub fn abandon(&mut self) -> Result<()> {
        self.state.transition(SessionEvent::Abandon)?;

        if let Some(timer) = self.timer.take() {
            tracing::debug!("Discarding rest timer at {}s", timer.remaining_seconds());
        }
        self.tracker = None;
        if let Some(record) = self.record.take() {
            tracing::info!(
                "Abandoned session {} after {} sets",
                record.id,
                record.completed_sets()
            );
        }
        self.apply(SessionEvent::Abandon)?;
        Ok(())
    }

    /// Drop a finished or abandoned session and return to `NotStarted`.
    /// Refused while a completed session is unsaved.
    fn clear_finished(&mut self) -> Result<()> {
        debug_assert!(self.state.is_terminal());
        if let Some(session) = &self.unsaved {
            return Err(Error::State(format!(
                "session {} has not been saved yet",
                session.record.id
            )));
        }
        self.state = SessionState::NotStarted;
        self.record = None;
        self.tracker = None;
        self.timer = None;
        self.summary = None;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sets
    // ------------------------------------------------------------------

    pub fn adjust_reps(&mut self, delta: i32) -> Result<()> {
        self.state.transition(SessionEvent::EditSet)?;
        self.active_tracker()?.adjust_reps(delta);
        Ok(())
    }

    pub fn adjust_weight(&mut self, delta: f64) -> Result<()> {
        self.state.transition(SessionEvent::EditSet)?;
        self.active_tracker()?.adjust_weight(delta);
        Ok(())
    }

    /// Record the active set with `reps` and `weight` and advance.
    ///
    /// Reps below one are raised to one; weight below zero is raised to zero.
    pub fn confirm_set(&mut self, reps: u32, weight: f64) -> Result<SetOutcome> {
        self.state.transition(SessionEvent::EditSet)?;
        if !weight.is_finite() {
            return Err(Error::InvalidWeight(weight));
        }

        let tracker = self.active_tracker()?;
        tracker.set_reps(reps);
        tracker.set_weight(weight)?;
        self.confirm_current_set()
    }

    /// Record the active set with the tracker's current values and advance
    pub fn confirm_current_set(&mut self) -> Result<SetOutcome> {
        let followup = self.followup()?;
        self.state.transition(SessionEvent::ConfirmSet(followup))?;

        let slot = self.current_slot().ok_or_else(no_session)?;
        let timer = match followup {
            Followup::Rest => Some(RestTimer::started(i64::from(
                slot.prescription.rest_seconds,
            ))?),
            _ => None,
        };

        let now = self.clock.now();
        let tracker = self.tracker.take().ok_or_else(no_session)?;
        let set = tracker.commit(now);
        let record = self.record.as_mut().ok_or_else(no_session)?;
        let exercise_index = record.position.exercise_index;

        tracing::info!(
            "Set {} of {} done: {} reps @ {}",
            set.set_index + 1,
            set.exercise_id,
            set.reps,
            set.weight
        );
        record.slots[exercise_index].sets.push(set);

        self.apply(SessionEvent::ConfirmSet(followup))?;

        match followup {
            Followup::Rest => {
                let rest_seconds = timer.as_ref().map_or(0, |t| t.total_seconds());
                self.timer = timer;
                tracing::info!("Resting {}s", rest_seconds);
                Ok(SetOutcome::Resting { rest_seconds })
            }
            Followup::NextExercise => {
                let record = self.record.as_mut().ok_or_else(no_session)?;
                record.position = SessionPosition {
                    exercise_index: exercise_index + 1,
                    set_index: 0,
                };
                self.begin_set()?;
                Ok(SetOutcome::NextExercise {
                    exercise_index: exercise_index + 1,
                })
            }
            Followup::Finish => self.finish(now).map(SetOutcome::Completed),
        }
    }

    // ------------------------------------------------------------------
    // Rest
    // ------------------------------------------------------------------

    /// One second of the ambient clock. Outside a running rest this is a no-op.
    pub fn tick(&mut self) -> Result<RestTick> {
        if self.state != SessionState::Resting {
            return Ok(RestTick::Idle);
        }
        let Some(timer) = self.timer.as_mut() else {
            return Ok(RestTick::Idle);
        };
        if !timer.is_running() {
            return Ok(RestTick::Idle);
        }

        if timer.tick() {
            self.end_rest()?;
            return Ok(RestTick::Finished);
        }
        Ok(RestTick::Counting {
            remaining_seconds: timer.remaining_seconds(),
        })
    }

    /// The rest timer reported completion
    pub fn rest_timer_complete(&mut self) -> Result<()> {
        self.state.transition(SessionEvent::EndRest)?;
        self.end_rest()
    }

    /// End the rest early
    pub fn skip_rest(&mut self) -> Result<()> {
        self.state.transition(SessionEvent::EndRest)?;
        if let Some(timer) = self.timer.as_mut() {
            timer.skip();
        }
        self.end_rest()
    }

    pub fn pause_rest(&mut self) {
        if let Some(timer) = self.resting_timer() {
            timer.pause();
        }
    }

    pub fn resume_rest(&mut self) {
        if let Some(timer) = self.resting_timer() {
            timer.resume();
        }
    }

    /// Lengthen or shorten the rest. The timer stops until resumed.
    pub fn adjust_rest(&mut self, delta_seconds: i64) {
        if let Some(timer) = self.resting_timer() {
            timer.adjust(delta_seconds);
        }
    }

    pub fn reset_rest(&mut self) {
        if let Some(timer) = self.resting_timer() {
            timer.reset();
        }
    }

    // ------------------------------------------------------------------
    // Substitution
    // ------------------------------------------------------------------

    /// Candidates to replace the current exercise, in catalog order
    pub fn substitution_candidates<'c>(
        &self,
        catalog: &'c dyn ExerciseCatalog,
    ) -> Result<impl Iterator<Item = ExerciseSummary> + 'c> {
        self.state.transition(SessionEvent::Substitute)?;
        let slot = self.current_slot().ok_or_else(no_session)?;
        SubstitutionResolver::new(catalog)
            .find_candidates(&slot.exercise_id, &slot.prescription.muscle_groups)
    }

    /// Swap the current exercise for `replacement`, keeping the slot's targets
    pub fn request_substitution(&mut self, replacement: &ExerciseSummary) -> Result<()> {
        self.state.transition(SessionEvent::Substitute)?;

        let now = self.clock.now();
        let record = self.record.as_mut().ok_or_else(no_session)?;
        let index = record.position.exercise_index;
        substitution::substitute(record, index, replacement, now)?;

        if self.tracker.is_some() {
            let slot = &record.slots[index];
            let weight = previous_weight(&self.store, slot);
            self.tracker = Some(SetTracker::initialize(
                slot.exercise_id.clone(),
                slot.completed_sets(),
                slot.prescription.target_reps,
                weight,
                now,
            ));
        }

        self.apply(SessionEvent::Substitute)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Try the completion write again for a session held after `WriteError`
    pub fn retry_persist(&mut self) -> Result<()> {
        self.persist()
    }

    pub fn pending_write(&self) -> bool {
        self.unsaved.is_some()
    }

    pub fn unsaved_session(&self) -> Option<&CompletedSession> {
        self.unsaved.as_ref()
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn record(&self) -> Option<&SessionRecord> {
        self.record.as_ref()
    }

    pub fn position(&self) -> Option<SessionPosition> {
        self.record.as_ref().map(|r| r.position)
    }

    pub fn current_slot(&self) -> Option<&ExerciseSlot> {
        self.record.as_ref().and_then(|r| r.current_slot())
    }

    pub fn tracker(&self) -> Option<&SetTracker> {
        self.tracker.as_ref()
    }

    pub fn rest_timer(&self) -> Option<&RestTimer> {
        self.timer.as_ref()
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn apply(&mut self, event: SessionEvent) -> Result<SessionState> {
        let next = self.state.transition(event)?;
        tracing::debug!("{:?} --{:?}--> {:?}", self.state, event, next);
        self.state = next;
        if let Some(record) = self.record.as_mut() {
            record.state = next;
        }
        Ok(next)
    }

    /// ExerciseActive -> SetActive with a fresh tracker
    fn begin_set(&mut self) -> Result<()> {
        self.state.transition(SessionEvent::BeginSet)?;
        self.activate_set()?;
        self.apply(SessionEvent::BeginSet)?;
        Ok(())
    }

    fn activate_set(&mut self) -> Result<()> {
        let now = self.clock.now();
        let record = self.record.as_mut().ok_or_else(no_session)?;
        let slot = record.current_slot().ok_or_else(no_session)?;

        let set_index = slot.completed_sets();
        let weight = previous_weight(&self.store, slot);
        let tracker = SetTracker::initialize(
            slot.exercise_id.clone(),
            set_index,
            slot.prescription.target_reps,
            weight,
            now,
        );

        tracing::debug!(
            "Set {} of {} active: {} reps @ {}",
            set_index + 1,
            tracker.exercise_id(),
            tracker.reps(),
            tracker.weight()
        );
        record.position.set_index = set_index;
        self.tracker = Some(tracker);
        Ok(())
    }

    fn end_rest(&mut self) -> Result<()> {
        let elapsed = self.timer.take().map_or(0, |t| t.elapsed_seconds());
        if let Some(record) = self.record.as_mut() {
            record.accumulated_rest_seconds += elapsed;
        }
        self.apply(SessionEvent::EndRest)?;
        self.activate_set()
    }

    fn finish(&mut self, now: chrono::DateTime<chrono::Utc>) -> Result<SessionSummary> {
        let record = self.record.as_mut().ok_or_else(no_session)?;
        record.completed_at = Some(now);

        let summary = scorer::score(record, now, self.settings.default_calories);
        tracing::info!(
            "Session {} complete: {}s, {} kcal, {} points",
            record.id,
            summary.duration_seconds,
            summary.estimated_calories,
            summary.points_earned
        );

        self.unsaved = Some(CompletedSession {
            record: record.clone(),
            summary: summary.clone(),
        });
        self.summary = Some(summary.clone());
        self.persist()?;
        Ok(summary)
    }

    fn persist(&mut self) -> Result<()> {
        let Some(session) = self.unsaved.as_ref() else {
            return Ok(());
        };

        let attempts = self.settings.write_attempts.max(2);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.store.save_session_record(session) {
                Ok(()) => {
                    self.unsaved = None;
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        "Saving session {} failed (attempt {}/{}): {}",
                        session.record.id,
                        attempt,
                        attempts,
                        e
                    );
                    last_error = match e {
                        Error::WriteError(msg) => msg,
                        other => other.to_string(),
                    };
                }
            }
        }

        Err(Error::WriteError(last_error))
    }

    fn followup(&self) -> Result<Followup> {
        let record = self.record.as_ref().ok_or_else(|| Error::InvalidTransition {
            state: self.state,
            event: SessionEvent::ConfirmSet(Followup::Finish),
        })?;
        let index = record.position.exercise_index;
        let slot = record.slots.get(index).ok_or_else(no_session)?;

        Ok(if slot.remaining_sets() > 1 {
            Followup::Rest
        } else if index + 1 < record.slots.len() {
            Followup::NextExercise
        } else {
            Followup::Finish
        })
    }

    fn active_tracker(&mut self) -> Result<&mut SetTracker> {
        self.tracker.as_mut().ok_or_else(no_session)
    }

    fn resting_timer(&mut self) -> Option<&mut RestTimer> {
        if self.state != SessionState::Resting {
            tracing::debug!("Ignoring rest control in {:?}", self.state);
            return None;
        }
        self.timer.as_mut()
    }
}

/// Weight to pre-fill for the next set of `slot`
fn previous_weight<S: SessionStore>(store: &S, slot: &ExerciseSlot) -> Option<f64> {
    if let Some(last) = slot.sets.last() {
        if last.exercise_id == slot.exercise_id {
            return Some(last.weight);
        }
    }

    match store.load_last_known_weight(&slot.exercise_id) {
        Ok(weight) => weight,
        Err(e) => {
            tracing::warn!("Could not load last weight for {}: {}", slot.exercise_id, e);
            None
        }
    }
}

fn no_session() -> Error {
    Error::State("no active session".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{build_default_catalog, get_default_catalog};
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use crate::{ExercisePrescription, SetRecord};
    use chrono::Utc;

    /// Store whose first `failures` writes fail
    #[derive(Default)]
    struct FlakyStore {
        failures: u32,
        attempts: u32,
        inner: MemoryStore,
    }

    impl SessionStore for FlakyStore {
        fn save_session_record(&mut self, session: &CompletedSession) -> Result<()> {
            self.attempts += 1;
            if self.failures > 0 {
                self.failures -= 1;
                return Err(Error::WriteError("disk unavailable".into()));
            }
            self.inner.save_session_record(session)
        }

        fn load_last_known_weight(&self, exercise_id: &str) -> Result<Option<f64>> {
            self.inner.load_last_known_weight(exercise_id)
        }
    }

    fn two_by_three() -> WorkoutPlan {
        let prescription = |id: &str, groups: &[&str]| ExercisePrescription {
            exercise_id: id.into(),
            name: id.into(),
            muscle_groups: groups.iter().map(|g| g.to_string()).collect(),
            target_sets: 3,
            target_reps: 10,
            rest_seconds: 60,
            equipment: None,
        };
        WorkoutPlan {
            id: "two_by_three".into(),
            name: "Two by three".into(),
            estimated_calories: None,
            exercises: vec![
                prescription("bench_press", &["chest"]),
                prescription("barbell_row", &["back"]),
            ],
        }
    }

    fn machine() -> (SessionStateMachine<MemoryStore, ManualClock>, ManualClock) {
        crate::logging::init_test();
        let clock = ManualClock::new(Utc::now());
        let machine =
            SessionStateMachine::with_clock(MemoryStore::default(), clock.clone(), EngineSettings::default());
        (machine, clock)
    }

    /// Confirm sets (skipping rests) until the session completes
    fn run_to_completion<S: SessionStore, C: Clock>(m: &mut SessionStateMachine<S, C>) -> u32 {
        let mut confirms = 0;
        while m.state() != SessionState::SessionCompleted {
            if m.state() == SessionState::Resting {
                m.skip_rest().unwrap();
            }
            let _ = m.confirm_current_set();
            confirms += 1;
            assert!(confirms <= 100, "session never completed");
        }
        confirms
    }

    #[test]
    fn test_start_enters_first_set() {
        let (mut m, _) = machine();
        m.start(two_by_three()).unwrap();

        assert_eq!(m.state(), SessionState::SetActive);
        assert_eq!(
            m.position(),
            Some(SessionPosition {
                exercise_index: 0,
                set_index: 0
            })
        );
        let tracker = m.tracker().unwrap();
        assert_eq!(tracker.reps(), 10);
        assert_eq!(tracker.weight(), 0.0);
        assert_eq!(m.record().unwrap().state, SessionState::SetActive);
    }

    #[test]
    fn test_confirm_count_equals_total_sets() {
        let catalog = build_default_catalog();
        for plan in &catalog.plans {
            let (mut m, _) = machine();
            m.start(plan.clone()).unwrap();
            assert_eq!(run_to_completion(&mut m), plan.total_sets());
            assert_eq!(m.store().sessions.len(), 1);
        }
    }

    #[test]
    fn test_twenty_minute_session_scores_sixty() {
        let (mut m, clock) = machine();
        m.start(two_by_three()).unwrap();

        let mut outcome = None;
        for set in 0..6 {
            if set == 5 {
                clock.set(m.record().unwrap().started_at + chrono::Duration::seconds(1200));
            }
            outcome = Some(m.confirm_set(10, 40.0).unwrap());
            if m.state() == SessionState::Resting {
                for _ in 0..59 {
                    assert!(matches!(m.tick().unwrap(), RestTick::Counting { .. }));
                }
                assert_eq!(m.tick().unwrap(), RestTick::Finished);
                assert_eq!(m.state(), SessionState::SetActive);
            }
        }

        let summary = match outcome {
            Some(SetOutcome::Completed(summary)) => summary,
            other => panic!("expected completion, got {:?}", other),
        };
        assert_eq!(summary.duration_seconds, 1200);
        assert_eq!(summary.points_earned, 60);
        assert_eq!(summary.estimated_calories, 300);
        assert_eq!(m.state(), SessionState::SessionCompleted);
        assert_eq!(m.record().unwrap().accumulated_rest_seconds, 240);

        let saved = &m.store().sessions[0];
        assert_eq!(saved.summary, summary);
        assert_eq!(saved.record.state, SessionState::SessionCompleted);
    }

    #[test]
    fn test_no_rest_between_exercises() {
        let (mut m, _) = machine();
        m.start(two_by_three()).unwrap();

        assert_eq!(
            m.confirm_current_set().unwrap(),
            SetOutcome::Resting { rest_seconds: 60 }
        );
        m.skip_rest().unwrap();
        m.confirm_current_set().unwrap();
        m.skip_rest().unwrap();

        assert_eq!(
            m.confirm_current_set().unwrap(),
            SetOutcome::NextExercise { exercise_index: 1 }
        );
        assert_eq!(m.state(), SessionState::SetActive);
        assert!(m.rest_timer().is_none());
        assert_eq!(m.tracker().unwrap().exercise_id(), "barbell_row");
    }

    #[test]
    fn test_abandon_mid_rest_discards_timer_and_writes_nothing() {
        let (mut m, _) = machine();
        m.start(two_by_three()).unwrap();
        m.confirm_current_set().unwrap();
        m.tick().unwrap();
        assert_eq!(m.state(), SessionState::Resting);

        m.abandon().unwrap();

        assert_eq!(m.state(), SessionState::Abandoned);
        assert!(m.rest_timer().is_none());
        assert!(m.record().is_none());
        assert!(m.store().sessions.is_empty());
        assert_eq!(m.tick().unwrap(), RestTick::Idle);
        assert!(m.abandon().is_err());
    }

    #[test]
    fn test_empty_plan_rejected() {
        let (mut m, _) = machine();
        let mut plan = two_by_three();
        plan.exercises.clear();

        assert!(matches!(m.start(plan), Err(Error::PlanEmpty(_))));
        assert_eq!(m.state(), SessionState::NotStarted);
    }

    #[test]
    fn test_zero_set_prescription_rejected() {
        let (mut m, _) = machine();
        let mut plan = two_by_three();
        plan.exercises[1].target_sets = 0;

        assert!(matches!(
            m.start(plan),
            Err(Error::InvalidPrescription { .. })
        ));
        assert!(m.record().is_none());
    }

    #[test]
    fn test_start_from_catalog() {
        let (mut m, _) = machine();
        let catalog = get_default_catalog();

        assert!(matches!(
            m.start_from_catalog(catalog, "missing"),
            Err(Error::NotFound(_))
        ));
        m.start_from_catalog(catalog, "quick_start").unwrap();
        assert_eq!(m.record().unwrap().plan_id, "quick_start");
        assert_eq!(m.record().unwrap().plan_calories, Some(150));
    }

    #[test]
    fn test_invalid_operations_leave_state_untouched() {
        let (mut m, _) = machine();
        assert!(matches!(
            m.confirm_current_set(),
            Err(Error::InvalidTransition { .. })
        ));
        assert!(m.skip_rest().is_err());

        m.start(two_by_three()).unwrap();
        assert!(m.start(two_by_three()).is_err());
        assert!(m.skip_rest().is_err());
        assert!(m.rest_timer_complete().is_err());

        m.confirm_current_set().unwrap();
        let before = m.record().unwrap().clone();
        assert!(matches!(
            m.confirm_set(10, 20.0),
            Err(Error::InvalidTransition {
                state: SessionState::Resting,
                ..
            })
        ));
        assert!(m.adjust_reps(1).is_err());
        assert_eq!(m.record().unwrap(), &before);
    }

    #[test]
    fn test_zero_reps_clamped_at_boundary() {
        let (mut m, _) = machine();
        m.start(two_by_three()).unwrap();
        m.confirm_set(0, -5.0).unwrap();

        let set = &m.record().unwrap().slots[0].sets[0];
        assert_eq!(set.reps, 1);
        assert_eq!(set.weight, 0.0);
        assert!(set.completed);
    }

    #[test]
    fn test_non_finite_weight_rejected() {
        let (mut m, _) = machine();
        m.start(two_by_three()).unwrap();

        assert!(matches!(
            m.confirm_set(10, f64::NAN),
            Err(Error::InvalidWeight(_))
        ));
        assert_eq!(m.state(), SessionState::SetActive);
        assert!(m.record().unwrap().slots[0].sets.is_empty());
    }

    #[test]
    fn test_tracker_edits_flow_into_record() {
        let (mut m, _) = machine();
        m.start(two_by_three()).unwrap();
        m.adjust_reps(-100).unwrap();
        m.adjust_weight(5.0).unwrap();
        m.adjust_weight(-10.0).unwrap();
        m.adjust_weight(2.5).unwrap();
        m.confirm_current_set().unwrap();

        let set = &m.record().unwrap().slots[0].sets[0];
        assert_eq!(set.reps, 1);
        assert_eq!(set.weight, 2.5);
    }

    #[test]
    fn test_weight_carries_to_next_set() {
        let (mut m, _) = machine();
        m.store_mut()
            .state
            .last_weights
            .insert("barbell_row".into(), 55.0);
        m.start(two_by_three()).unwrap();

        m.confirm_set(10, 60.0).unwrap();
        m.skip_rest().unwrap();
        assert_eq!(m.tracker().unwrap().weight(), 60.0);
        assert_eq!(m.tracker().unwrap().set_index(), 1);

        m.confirm_current_set().unwrap();
        m.skip_rest().unwrap();
        m.confirm_current_set().unwrap();

        // New exercise picks up the stored weight
        assert_eq!(m.tracker().unwrap().weight(), 55.0);
    }

    #[test]
    fn test_rest_controls() {
        let (mut m, _) = machine();
        m.start(two_by_three()).unwrap();

        // Ignored outside rest
        m.adjust_rest(30);
        m.pause_rest();

        m.confirm_current_set().unwrap();
        for _ in 0..10 {
            m.tick().unwrap();
        }
        m.pause_rest();
        assert_eq!(m.tick().unwrap(), RestTick::Idle);
        assert_eq!(m.rest_timer().unwrap().remaining_seconds(), 50);

        m.adjust_rest(30);
        let timer = m.rest_timer().unwrap();
        assert_eq!(timer.total_seconds(), 90);
        assert_eq!(timer.remaining_seconds(), 80);
        assert!(!timer.is_running());

        m.reset_rest();
        assert_eq!(m.rest_timer().unwrap().remaining_seconds(), 90);

        m.resume_rest();
        assert_eq!(
            m.tick().unwrap(),
            RestTick::Counting {
                remaining_seconds: 89
            }
        );

        m.skip_rest().unwrap();
        assert_eq!(m.record().unwrap().accumulated_rest_seconds, 11);
    }

    #[test]
    fn test_rest_timer_complete_advances() {
        let (mut m, _) = machine();
        m.start(two_by_three()).unwrap();
        m.confirm_current_set().unwrap();

        m.rest_timer_complete().unwrap();
        assert_eq!(m.state(), SessionState::SetActive);
        assert!(m.rest_timer().is_none());
        assert_eq!(m.position().unwrap().set_index, 1);
    }

    #[test]
    fn test_substitution_before_first_set_preserves_targets() {
        let (mut m, _) = machine();
        let catalog = build_default_catalog();
        m.start(two_by_three()).unwrap();

        let candidates: Vec<ExerciseSummary> =
            m.substitution_candidates(&catalog).unwrap().collect();
        assert_eq!(candidates[0].id, "dumbbell_bench_press");

        m.request_substitution(&candidates[0]).unwrap();

        assert_eq!(m.state(), SessionState::SetActive);
        let slot = m.current_slot().unwrap();
        assert_eq!(slot.exercise_id, "dumbbell_bench_press");
        assert_eq!(slot.prescription.target_sets, 3);
        assert_eq!(slot.prescription.target_reps, 10);
        assert_eq!(slot.prescription.rest_seconds, 60);
        assert_eq!(m.tracker().unwrap().exercise_id(), "dumbbell_bench_press");
    }

    #[test]
    fn test_substitution_between_sets_keeps_history() {
        let (mut m, _) = machine();
        let catalog = build_default_catalog();
        m.start(two_by_three()).unwrap();
        m.confirm_set(10, 70.0).unwrap();

        // Not while resting
        let push_up = catalog.exercise("push_up").unwrap().clone();
        assert!(matches!(
            m.request_substitution(&push_up),
            Err(Error::InvalidTransition { .. })
        ));

        m.skip_rest().unwrap();
        m.request_substitution(&push_up).unwrap();

        let tracker = m.tracker().unwrap();
        assert_eq!(tracker.exercise_id(), "push_up");
        assert_eq!(tracker.set_index(), 1);
        assert_eq!(tracker.weight(), 0.0);

        m.confirm_current_set().unwrap();
        let slot = &m.record().unwrap().slots[0];
        let attributed: Vec<&str> = slot.sets.iter().map(|s| s.exercise_id.as_str()).collect();
        assert_eq!(attributed, vec!["bench_press", "push_up"]);
    }

    #[test]
    fn test_substitution_rejected_after_completion() {
        let (mut m, _) = machine();
        let catalog = build_default_catalog();
        m.start(two_by_three()).unwrap();
        run_to_completion(&mut m);

        let replacement = catalog.exercise("lat_pulldown").unwrap().clone();
        assert!(m.request_substitution(&replacement).is_err());
        assert!(m.substitution_candidates(&catalog).is_err());
    }

    #[test]
    fn test_write_retried_once_automatically() {
        let clock = ManualClock::new(Utc::now());
        let store = FlakyStore {
            failures: 1,
            ..Default::default()
        };
        let mut m = SessionStateMachine::with_clock(store, clock, EngineSettings::default());
        m.start(two_by_three()).unwrap();
        run_to_completion(&mut m);

        assert_eq!(m.store().attempts, 2);
        assert_eq!(m.store().inner.sessions.len(), 1);
        assert!(!m.pending_write());
    }

    #[test]
    fn test_single_write_attempt_still_retries() {
        let clock = ManualClock::new(Utc::now());
        let store = FlakyStore {
            failures: 1,
            ..Default::default()
        };
        let settings = EngineSettings {
            write_attempts: 1,
            ..Default::default()
        };
        let mut m = SessionStateMachine::with_clock(store, clock, settings);
        m.start(two_by_three()).unwrap();
        run_to_completion(&mut m);

        assert_eq!(m.store().attempts, 2);
        assert_eq!(m.store().inner.sessions.len(), 1);
        assert!(!m.pending_write());
    }

    #[test]
    fn test_repeated_write_failure_holds_session() {
        let clock = ManualClock::new(Utc::now());
        let store = FlakyStore {
            failures: 2,
            ..Default::default()
        };
        let mut m = SessionStateMachine::with_clock(store, clock, EngineSettings::default());
        m.start(two_by_three()).unwrap();

        let mut last = None;
        while m.state() != SessionState::SessionCompleted {
            if m.state() == SessionState::Resting {
                m.skip_rest().unwrap();
            }
            last = Some(m.confirm_current_set());
        }

        assert!(matches!(last, Some(Err(Error::WriteError(_)))));
        assert_eq!(m.state(), SessionState::SessionCompleted);
        assert!(m.pending_write());
        assert!(m.summary().is_some());
        assert!(m.store().inner.sessions.is_empty());

        // Cannot start over while the session is unsaved
        assert!(m.start(two_by_three()).is_err());

        m.retry_persist().unwrap();
        assert!(!m.pending_write());
        assert_eq!(m.store().inner.sessions.len(), 1);
        assert_eq!(
            &m.store().inner.sessions[0].summary,
            m.summary().unwrap()
        );
    }

    #[test]
    fn test_new_session_after_abandon() {
        let (mut m, _) = machine();
        m.start(two_by_three()).unwrap();
        m.confirm_set(10, 40.0).unwrap();
        m.abandon().unwrap();
        assert_eq!(m.state(), SessionState::Abandoned);

        m.start(two_by_three()).unwrap();
        assert_eq!(m.state(), SessionState::SetActive);
        assert_eq!(m.record().unwrap().completed_sets(), 0);
        assert!(m.store().sessions.is_empty());
    }

    #[test]
    fn test_new_session_after_completion() {
        let (mut m, _) = machine();
        m.start(two_by_three()).unwrap();
        run_to_completion(&mut m);
        let first = m.record().unwrap().id;

        m.start(two_by_three()).unwrap();
        assert_eq!(m.state(), SessionState::SetActive);
        assert_ne!(m.record().unwrap().id, first);
        assert!(m.summary().is_none());
    }

    #[test]
    fn test_completed_sets_are_frozen_records() {
        let (mut m, _) = machine();
        m.start(two_by_three()).unwrap();
        m.confirm_set(8, 42.5).unwrap();

        let expected: &SetRecord = &m.record().unwrap().slots[0].sets[0];
        assert_eq!(expected.set_index, 0);
        assert_eq!(expected.reps, 8);
        assert_eq!(expected.weight, 42.5);
    }
}
