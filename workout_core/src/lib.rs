#![forbid(unsafe_code)]

//! Core domain model and session engine for Lift.
//!
//! This crate provides:
//! - Domain types (plans, prescriptions, sets, sessions, summaries)
//! - The session state machine with its rest timer and set tracker
//! - Exercise catalog and substitution
//! - Scoring
//! - Persistence (WAL, CSV, state)

pub mod types;
pub mod error;
pub mod clock;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod timer;
pub mod tracker;
pub mod substitution;
pub mod scorer;
pub mod engine;
pub mod wal;
pub mod state;
pub mod store;
pub mod csv_rollup;
pub mod history;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog, ExerciseCatalog, PlanCatalog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use engine::{EngineSettings, RestTick, SessionStateMachine, SetOutcome};
pub use history::{load_recent_sessions, SessionHistoryEntry};
pub use store::{FileStore, MemoryStore, SessionStore};
pub use timer::RestTimer;
pub use tracker::SetTracker;
