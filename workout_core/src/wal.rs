//! Write-Ahead Log (WAL) for completed sessions.
//!
//! Completed sessions are appended to a JSONL (JSON Lines) file with file
//! locking to ensure safe concurrent access. Appends and rollups also take
//! an exclusive lock on a sidecar `.lock` file, so a rollup never renames
//! the WAL out from under a writer.

use crate::{CompletedSession, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Exclusive hold on a WAL; released when dropped
pub struct WalGuard {
    _file: File,
}

/// JSONL session log with file locking
#[derive(Clone, Debug)]
pub struct JsonlWal {
    path: PathBuf,
}

impl JsonlWal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hold the WAL exclusively until the guard is dropped
    pub fn lock(&self) -> Result<WalGuard> {
        self.ensure_parent_dir()?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.path.with_extension("wal.lock"))?;
        file.lock_exclusive()?;
        Ok(WalGuard { _file: file })
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    pub fn append(&self, session: &CompletedSession) -> Result<()> {
        let _guard = self.lock()?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        if ends_mid_line(&file)? {
            tracing::warn!("Terminating partial line in {:?}", self.path);
            writer.write_all(b"\n")?;
        }
        let line = serde_json::to_string(session)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!("Appended session {} to WAL", session.record.id);
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<CompletedSession>> {
        read_sessions(&self.path)
    }
}

/// Whether the last line of `file` lacks its newline (interrupted append)
fn ends_mid_line(mut file: &File) -> Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Read all sessions from a WAL file, skipping lines that do not parse
pub fn read_sessions(path: &Path) -> Result<Vec<CompletedSession>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut sessions = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<CompletedSession>(&line) {
            Ok(session) => sessions.push(session),
            Err(e) => {
                tracing::warn!("Failed to parse session at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} sessions from WAL", sessions.len());
    Ok(sessions)
}
