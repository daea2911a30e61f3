//! CSV rollup for archiving WAL sessions.
//!
//! Each completed session becomes one summary row. Set-level detail stays in
//! the archived `.wal.processed` file.

use crate::wal::JsonlWal;
use crate::{CompletedSession, Result};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::Path;

/// One row of `sessions.csv`
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SessionRow {
    pub id: String,
    pub plan_id: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub duration: u64,
    pub calories: u32,
    pub points: u64,
    pub exercises: u32,
    pub sets: u32,
}

impl From<&CompletedSession> for SessionRow {
    fn from(session: &CompletedSession) -> Self {
        let record = &session.record;
        SessionRow {
            id: record.id.to_string(),
            plan_id: record.plan_id.clone(),
            started_at: record.started_at.to_rfc3339(),
            completed_at: record.completed_at.map(|t| t.to_rfc3339()),
            duration: session.summary.duration_seconds,
            calories: session.summary.estimated_calories,
            points: session.summary.points_earned,
            exercises: session.summary.exercises_completed,
            sets: session.summary.sets_completed,
        }
    }
}

/// Roll up WAL sessions into CSV and archive the WAL.
///
/// The CSV is synced to disk before the WAL is renamed to
/// `.wal.processed`, so a crash in between leaves the WAL in place.
/// Returns the number of sessions written.
pub fn wal_to_csv_and_archive(wal_path: &Path, csv_path: &Path) -> Result<usize> {
    let wal = JsonlWal::new(wal_path);
    let _guard = wal.lock()?;
    let sessions = wal.read_all()?;

    if sessions.is_empty() {
        tracing::info!("No sessions in WAL to roll up");
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    // Header only when starting a fresh file
    let needs_headers = file.metadata()?.len() == 0;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    for session in &sessions {
        writer.serialize(SessionRow::from(session))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Wrote {} sessions to CSV", sessions.len());

    let processed_path = wal_path.with_extension("wal.processed");
    std::fs::rename(wal_path, &processed_path)?;
    tracing::info!("Archived WAL to {:?}", processed_path);

    Ok(sessions.len())
}

/// Remove every `.processed` file in `dir`
pub fn cleanup_processed_wals(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "processed") {
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed processed WAL: {:?}", path);
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed WAL files", count);
    }
    Ok(count)
}
