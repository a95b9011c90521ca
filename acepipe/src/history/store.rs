//! Loading and atomically saving the history file.

use super::HistoryLog;
use crate::errors::PersistenceError;
use crate::playbook::Playbook;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// What a history load produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedHistory {
    /// Every run recorded so far.
    pub log: HistoryLog,
    /// The playbook to resume from.
    pub playbook: Playbook,
    /// True if the playbook came from the last entry's snapshot.
    pub restored: bool,
}

/// A history file on disk.
///
/// The store holds nothing but its path; the log itself is owned by the
/// engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// Creates a store for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the history file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the history file.
    ///
    /// A missing file is a fresh start. Otherwise the playbook is restored
    /// from the last entry's snapshot.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the file exists but cannot be read or
    /// parsed.
    pub fn load(&self) -> Result<LoadedHistory, PersistenceError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No history file found; starting fresh");
                return Ok(LoadedHistory::default());
            }
            Err(e) => return Err(PersistenceError::io(&self.path, e)),
        };

        let log: HistoryLog = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| PersistenceError::serialization(&self.path, e))?;

        let (playbook, restored) = match log.latest_playbook() {
            Some(playbook) => (playbook.clone(), true),
            None if log.is_empty() => (Playbook::default(), false),
            None => {
                warn!(path = %self.path.display(), "Last history entry has no playbook snapshot; starting with an empty playbook");
                (Playbook::default(), false)
            }
        };

        info!(
            path = %self.path.display(),
            runs = log.len(),
            strategies = playbook.len(),
            restored,
            "History loaded"
        );
        Ok(LoadedHistory { log, playbook, restored })
    }

    /// Returns where an unreadable history file is moved aside:
    /// the history path with `.bak` appended.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map_or_else(|| OsString::from("history"), OsString::from);
        name.push(".bak");
        self.path.with_file_name(name)
    }

    /// Like [`load`](Self::load), but logs failures and starts fresh.
    ///
    /// An unreadable file is renamed to [`backup_path`](Self::backup_path)
    /// first, so the next save does not destroy it.
    #[must_use]
    pub fn load_or_default(&self) -> LoadedHistory {
        self.load().unwrap_or_else(|e| {
            let backup = self.backup_path();
            match fs::rename(&self.path, &backup) {
                Ok(()) => warn!(
                    error = %e,
                    backup = %backup.display(),
                    "Could not load history; moved it aside and starting fresh"
                ),
                Err(rename_error) => warn!(
                    error = %e,
                    rename_error = %rename_error,
                    "Could not load history or move it aside; starting fresh"
                ),
            }
            LoadedHistory::default()
        })
    }

    /// Writes the whole log as pretty JSON.
    ///
    /// The data goes to a temporary file in the same directory which is then
    /// renamed over the target, so a reader never sees a partial file.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if any step fails; the previous file is
    /// left untouched in that case.
    pub fn save(&self, log: &HistoryLog) -> Result<(), PersistenceError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let tmp = NamedTempFile::new_in(dir).map_err(|e| PersistenceError::io(&self.path, e))?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, log)
                .map_err(|e| PersistenceError::serialization(&self.path, e))?;
            writer.flush().map_err(|e| PersistenceError::io(&self.path, e))?;
        }
        tmp.as_file().sync_all().map_err(|e| PersistenceError::io(&self.path, e))?;
        tmp.persist(&self.path)
            .map_err(|e| PersistenceError::io(&self.path, e.error))?;

        debug!(path = %self.path.display(), runs = log.len(), "History saved");
        Ok(())
    }
}
