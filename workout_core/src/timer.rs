//! Rest countdown between sets.
//!
//! The timer has no notion of wall-clock time. An external scheduler calls
//! [`RestTimer::tick`] once per second while the session is resting.
//!
//! Completion is reported through return values: `tick()` and `skip()` return
//! `true` on the single call that fires completion for the current cycle.
//! Everything after that is a no-op until the next `start()`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Shortest rest the timer will count down
pub const MIN_REST_SECONDS: u32 = 10;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestTimer {
    total_seconds: u32,
    remaining_seconds: u32,
    running: bool,
    completed: bool,
    ticked_seconds: u32,
}

impl RestTimer {
    /// Create a timer already armed with `seconds`
    pub fn started(seconds: i64) -> Result<Self> {
        let mut timer = Self::default();
        timer.start(seconds)?;
        Ok(timer)
    }

    /// Arm the timer. Durations under the minimum are raised to it.
    pub fn start(&mut self, seconds: i64) -> Result<()> {
        if seconds < 0 {
            return Err(Error::InvalidDuration(seconds));
        }

        let total = u32::try_from(seconds)
            .unwrap_or(u32::MAX)
            .max(MIN_REST_SECONDS);
        self.total_seconds = total;
        self.remaining_seconds = total;
        self.running = true;
        self.completed = false;
        self.ticked_seconds = 0;

        tracing::debug!("Rest timer started: {}s", total);
        Ok(())
    }

    /// Count down one second. Returns `true` when this tick fires completion.
    pub fn tick(&mut self) -> bool {
        if !self.running || self.completed {
            return false;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        self.ticked_seconds += 1;
        if self.remaining_seconds == 0 {
            self.finish();
            return true;
        }
        false
    }

    pub fn pause(&mut self) {
        if self.completed {
            return;
        }
        self.running = false;
    }

    pub fn resume(&mut self) {
        if self.completed || self.running {
            return;
        }
        self.running = true;
    }

    /// Move total and remaining together by `delta_seconds`.
    ///
    /// Total never drops below the minimum; remaining moves by the same
    /// effective amount but stays at one second or more, so only a tick or a
    /// skip can fire completion. The timer stops and has to be resumed
    /// explicitly.
    pub fn adjust(&mut self, delta_seconds: i64) {
        if self.completed {
            tracing::debug!("Ignoring adjust on expired rest timer");
            return;
        }

        let new_total = (i64::from(self.total_seconds) + delta_seconds)
            .clamp(i64::from(MIN_REST_SECONDS), i64::from(u32::MAX));
        let effective = new_total - i64::from(self.total_seconds);
        let new_remaining =
            (i64::from(self.remaining_seconds) + effective).clamp(1, new_total);

        self.total_seconds = new_total as u32;
        self.remaining_seconds = new_remaining as u32;
        self.running = false;

        tracing::debug!(
            "Rest timer adjusted by {}s: {}/{}s",
            effective,
            self.remaining_seconds,
            self.total_seconds
        );
    }

    pub fn reset(&mut self) {
        if self.completed {
            return;
        }
        self.remaining_seconds = self.total_seconds;
        self.running = false;
    }

    /// End the countdown now. Returns `true` if this call fired completion.
    pub fn skip(&mut self) -> bool {
        if self.completed {
            return false;
        }
        self.finish();
        true
    }

    fn finish(&mut self) {
        self.remaining_seconds = 0;
        self.running = false;
        self.completed = true;
    }

    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Seconds actually spent ticking in this cycle, across resets and skips
    pub fn elapsed_seconds(&self) -> u32 {
        self.ticked_seconds
    }
}
