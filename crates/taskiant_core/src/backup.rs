//! Rotating file-level snapshots of the store.
//!
//! # Responsibility
//! - Copy the store into `backup_dir` under a timestamped name.
//! - Keep at most `max_backups` snapshots, dropping the oldest.
//! - List and restore snapshots.
//!
//! # Invariants
//! - Names are `storage-YYYY-MM-DD_HH-MM-SS.db`; lexical order is
//!   chronological order.
//! - Expected failures (missing source, unreadable directory) return
//!   `false` / empty and are logged; they never panic or propagate.
//! - Failing to delete one old snapshot does not abort the backup.

use crate::db::StoreHandle;
use chrono::NaiveDateTime;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const BACKUP_PREFIX: &str = "storage-";
const BACKUP_SUFFIX: &str = ".db";
const FILENAME_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    /// Snapshot time decoded from the filename, `YYYY-MM-DD HH:MM:SS`.
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_dir: PathBuf,
    max_backups: usize,
}

impl BackupManager {
    /// `max_backups` below 1 is raised to 1.
    pub fn new(backup_dir: impl Into<PathBuf>, max_backups: usize) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            max_backups: max_backups.max(1),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    /// Copies `source` into a new snapshot stamped with the local time.
    ///
    /// Only call between logical operations; a copy taken mid-write is not
    /// a consistent snapshot. Prefer [`Self::create_backup_from_store`] for
    /// an open store.
    pub fn create_backup(&self, source: impl AsRef<Path>) -> bool {
        self.create_backup_at(source.as_ref(), crate::clock::now())
    }

    /// Checkpoints the write-ahead log of `store`, then snapshots its file.
    pub fn create_backup_from_store(&self, store: &StoreHandle) -> bool {
        let Some(path) = store.path() else {
            warn!("event=backup_create module=backup status=skipped reason=in_memory_store");
            return false;
        };
        if let Err(err) = store.checkpoint() {
            error!(
                "event=backup_create module=backup status=error error_code=checkpoint_failed error={err}"
            );
            return false;
        }
        self.create_backup(path)
    }

    /// Like [`Self::create_backup`], stamped with `at` instead of the clock.
    pub fn create_backup_at(&self, source: &Path, at: NaiveDateTime) -> bool {
        if !source.is_file() {
            warn!("event=backup_create module=backup status=error error_code=source_missing");
            return false;
        }
        if let Err(err) = fs::create_dir_all(&self.backup_dir) {
            error!(
                "event=backup_create module=backup status=error error_code=backup_dir_unavailable error={err}"
            );
            return false;
        }

        let filename = backup_filename(at);
        self.rotate(&filename);

        let target = self.backup_dir.join(&filename);
        match fs::copy(source, &target) {
            Ok(bytes) => {
                info!("event=backup_create module=backup status=ok bytes={bytes}");
                true
            }
            Err(err) => {
                error!(
                    "event=backup_create module=backup status=error error_code=copy_failed error={err}"
                );
                false
            }
        }
    }

    /// Snapshots in this manager's directory, newest first.
    pub fn list_backups(&self) -> Vec<BackupEntry> {
        match self.read_backups() {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                error!(
                    "event=backup_list module=backup status=error error_code=read_dir_failed error={err}"
                );
                Vec::new()
            }
        }
    }

    /// Overwrites `target` with the bytes of `backup`.
    ///
    /// The caller must close any handle on `target` first and reopen it
    /// afterwards. Stale `-wal`/`-shm` companions of `target` are removed
    /// so they cannot be replayed over the restored file.
    pub fn restore_backup(&self, backup: impl AsRef<Path>, target: impl AsRef<Path>) -> bool {
        let backup = backup.as_ref();
        let target = target.as_ref();
        if !backup.is_file() {
            warn!("event=backup_restore module=backup status=error error_code=backup_missing");
            return false;
        }

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(err) = fs::create_dir_all(parent) {
                error!(
                    "event=backup_restore module=backup status=error error_code=target_dir_unavailable error={err}"
                );
                return false;
            }
        }

        match fs::copy(backup, target) {
            Ok(bytes) => {
                for suffix in ["-wal", "-shm"] {
                    let mut companion = target.as_os_str().to_owned();
                    companion.push(suffix);
                    let companion = PathBuf::from(companion);
                    if let Err(err) = fs::remove_file(&companion) {
                        if err.kind() != io::ErrorKind::NotFound {
                            warn!(
                                "event=backup_restore module=backup status=degraded error_code=companion_not_removed suffix={suffix} error={err}"
                            );
                        }
                    }
                }
                info!("event=backup_restore module=backup status=ok bytes={bytes}");
                true
            }
            Err(err) => {
                error!(
                    "event=backup_restore module=backup status=error error_code=copy_failed error={err}"
                );
                false
            }
        }
    }

    // Makes room so that, once `incoming` is written, at most `max_backups`
    // snapshots remain.
    fn rotate(&self, incoming: &str) {
        let existing = match self.read_backups() {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    "event=backup_rotate module=backup status=error error_code=read_dir_failed error={err}"
                );
                return;
            }
        };
        let existing: Vec<BackupEntry> = existing
            .into_iter()
            .filter(|entry| entry.filename != incoming)
            .collect();
        if existing.len() < self.max_backups {
            return;
        }

        for stale in existing.iter().skip(self.max_backups - 1) {
            match fs::remove_file(&stale.path) {
                Ok(()) => info!("event=backup_rotate module=backup status=ok removed=1"),
                Err(err) => warn!(
                    "event=backup_rotate module=backup status=error error_code=remove_failed error={err}"
                ),
            }
        }
    }

    fn read_backups(&self) -> io::Result<Vec<BackupEntry>> {
        let mut entries = Vec::new();
        for item in fs::read_dir(&self.backup_dir)? {
            let item = item?;
            let Some(filename) = item.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some(created_at) = parse_backup_filename(&filename) else {
                continue;
            };
            let metadata = item.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            entries.push(BackupEntry {
                path: item.path(),
                size: metadata.len(),
                created_at: crate::clock::format_timestamp(created_at),
                filename,
            });
        }
        entries.sort_by(|a, b| b.filename.cmp(&a.filename));
        Ok(entries)
    }
}

pub fn backup_filename(at: NaiveDateTime) -> String {
    format!(
        "{BACKUP_PREFIX}{}{BACKUP_SUFFIX}",
        at.format(FILENAME_TIMESTAMP_FORMAT)
    )
}

/// Decodes the snapshot time; `None` for files that are not snapshots.
pub fn parse_backup_filename(filename: &str) -> Option<NaiveDateTime> {
    let stamp = filename
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(BACKUP_SUFFIX)?;
    NaiveDateTime::parse_from_str(stamp, FILENAME_TIMESTAMP_FORMAT).ok()
}
