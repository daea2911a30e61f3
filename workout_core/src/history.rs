//! Recent session history from the WAL and the CSV archive.

use crate::csv_rollup::SessionRow;
use crate::{CompletedSession, Error, Result};
use chrono::{DateTime, Duration, Utc};
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

/// Summary of one finished session, whichever file it came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionHistoryEntry {
    pub id: Uuid,
    pub plan_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: u64,
    pub estimated_calories: u32,
    pub points_earned: u64,
    pub exercises_completed: u32,
    pub sets_completed: u32,
}

impl From<&CompletedSession> for SessionHistoryEntry {
    fn from(session: &CompletedSession) -> Self {
        Self {
            id: session.record.id,
            plan_id: session.record.plan_id.clone(),
            started_at: session.record.started_at,
            completed_at: session.record.completed_at,
            duration_seconds: session.summary.duration_seconds,
            estimated_calories: session.summary.estimated_calories,
            points_earned: session.summary.points_earned,
            exercises_completed: session.summary.exercises_completed,
            sets_completed: session.summary.sets_completed,
        }
    }
}

impl TryFrom<SessionRow> for SessionHistoryEntry {
    type Error = Error;

    fn try_from(row: SessionRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| Error::Other(format!("Invalid UUID: {}", e)))?;

        let started_at = DateTime::parse_from_rfc3339(&row.started_at)
            .map_err(|e| Error::Other(format!("Invalid date: {}", e)))?
            .with_timezone(&Utc);

        let completed_at = row
            .completed_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(Self {
            id,
            plan_id: row.plan_id,
            started_at,
            completed_at,
            duration_seconds: row.duration,
            estimated_calories: row.calories,
            points_earned: row.points,
            exercises_completed: row.exercises,
            sets_completed: row.sets,
        })
    }
}

/// Load sessions started in the last `days` days from both WAL and CSV.
///
/// Sessions present in both files are reported once. Newest first.
pub fn load_recent_sessions(
    wal_path: &Path,
    csv_path: &Path,
    days: i64,
) -> Result<Vec<SessionHistoryEntry>> {
    let cutoff = Utc::now() - Duration::days(days);
    let mut entries = Vec::new();
    let mut seen_ids = HashSet::new();

    if wal_path.exists() {
        for session in crate::wal::read_sessions(wal_path)? {
            let entry = SessionHistoryEntry::from(&session);
            if entry.started_at >= cutoff && seen_ids.insert(entry.id) {
                entries.push(entry);
            }
        }
        tracing::debug!("Loaded {} sessions from WAL", entries.len());
    }

    if csv_path.exists() {
        let mut csv_count = 0;
        for entry in load_entries_from_csv(csv_path)? {
            if entry.started_at >= cutoff && seen_ids.insert(entry.id) {
                entries.push(entry);
                csv_count += 1;
            }
        }
        tracing::debug!("Loaded {} sessions from CSV", csv_count);
    }

    entries.sort_by(|a, b| b.started_at.cmp(&a.started_at));

    tracing::info!(
        "Loaded {} total sessions from last {} days",
        entries.len(),
        days
    );
    Ok(entries)
}

fn load_entries_from_csv(path: &Path) -> Result<Vec<SessionHistoryEntry>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut entries = Vec::new();
    for result in reader.deserialize::<SessionRow>() {
        match result.map_err(Error::from).and_then(SessionHistoryEntry::try_from) {
            Ok(entry) => entries.push(entry),
            Err(e) => tracing::warn!("Skipping CSV row: {}", e),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::tests::completed_session;
    use crate::wal::JsonlWal;

    #[test]
    fn test_load_recent_sessions_from_wal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("sessions.wal");
        let csv_path = temp_dir.path().join("sessions.csv");

        let wal = JsonlWal::new(&wal_path);
        wal.append(&completed_session(1, 10.0)).unwrap();
        wal.append(&completed_session(3, 10.0)).unwrap();
        wal.append(&completed_session(10, 10.0)).unwrap(); // Too old

        let entries = load_recent_sessions(&wal_path, &csv_path, 7).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_deduplication_across_wal_and_csv() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("sessions.wal");
        let csv_path = temp_dir.path().join("sessions.csv");

        let session = completed_session(1, 10.0);
        let wal = JsonlWal::new(&wal_path);
        wal.append(&session).unwrap();
        crate::csv_rollup::wal_to_csv_and_archive(&wal_path, &csv_path).unwrap();

        // Same session back in a fresh WAL
        wal.append(&session).unwrap();

        let entries = load_recent_sessions(&wal_path, &csv_path, 7).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], SessionHistoryEntry::from(&session));
    }

    #[test]
    fn test_csv_entries_match_wal_entries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("sessions.wal");
        let csv_path = temp_dir.path().join("sessions.csv");

        let session = completed_session(2, 15.0);
        JsonlWal::new(&wal_path).append(&session).unwrap();
        crate::csv_rollup::wal_to_csv_and_archive(&wal_path, &csv_path).unwrap();

        let entries = load_recent_sessions(&wal_path, &csv_path, 7).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, session.record.id);
        assert_eq!(entries[0].points_earned, session.summary.points_earned);
        assert_eq!(entries[0].sets_completed, 4);
    }

    #[test]
    fn test_sessions_sorted_newest_first() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("sessions.wal");
        let csv_path = temp_dir.path().join("sessions.csv");

        let old = completed_session(5, 10.0);
        let new = completed_session(1, 10.0);
        let wal = JsonlWal::new(&wal_path);
        wal.append(&old).unwrap();
        wal.append(&new).unwrap();

        let entries = load_recent_sessions(&wal_path, &csv_path, 7).unwrap();
        assert_eq!(entries[0].id, new.record.id);
        assert_eq!(entries[1].id, old.record.id);
    }

    #[test]
    fn test_bad_csv_rows_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("missing.wal");
        let csv_path = temp_dir.path().join("sessions.csv");

        let session = completed_session(0, 10.0);
        let row = SessionRow::from(&session);
        let mut writer = csv::Writer::from_path(&csv_path).unwrap();
        writer.serialize(&row).unwrap();
        writer
            .serialize(SessionRow {
                id: "not-a-uuid".into(),
                ..SessionRow::from(&session)
            })
            .unwrap();
        writer.flush().unwrap();

        let entries = load_recent_sessions(&wal_path, &csv_path, 7).unwrap();
        assert_eq!(entries.len(), 1);
    }
}
