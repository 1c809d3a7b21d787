//! Timestamped copies of installed mod payloads: `<root>/<mod>/<timestamp>/...`.

use crate::{CoreError, Result as CoreResult};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, info, warn};

/// Basic ISO 8601 so names sort chronologically and stay valid on Windows.
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";

/// A completed backup of one mod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub path: PathBuf,
    /// False when nothing was installed yet; restoring then removes the install.
    pub had_payload: bool,
}

#[derive(Debug, Clone)]
pub struct BackupStore {
    root: PathBuf,
    retention: usize,
}

impl BackupStore {
    pub fn new(root: impl Into<PathBuf>, retention: usize) -> Self {
        Self {
            root: root.into(),
            retention: retention.max(1),
        }
    }

    pub fn mod_dir(&self, workshop_id: &str) -> PathBuf {
        self.root.join(workshop_id)
    }

    /// Copy `install_dir` into a fresh timestamped directory.
    pub async fn backup(&self, workshop_id: &str, install_dir: &Path) -> CoreResult<BackupRecord> {
        let mod_dir = self.mod_dir(workshop_id);
        let install_dir = install_dir.to_path_buf();
        let id = workshop_id.to_string();

        let (dest, result) = tokio::task::spawn_blocking(move || {
            let dest = unique_backup_dir(&mod_dir);
            let result = write_backup(&install_dir, &dest);
            (dest, result)
        })
        .await
        .map_err(|e| CoreError::from(io::Error::other(e)))?;

        match result {
            Ok(had_payload) => {
                info!("Backed up mod {id} to {}", dest.display());
                Ok(BackupRecord {
                    path: dest,
                    had_payload,
                })
            }
            Err(e) => {
                if dest.exists()
                    && let Err(cleanup) = fs::remove_dir_all(&dest)
                {
                    warn!("Could not remove partial backup {}: {cleanup}", dest.display());
                }
                Err(CoreError::backup(&id, dest, e))
            }
        }
    }

    /// Put the backed-up payload back in place of whatever is installed now.
    pub async fn restore(
        &self,
        workshop_id: &str,
        record: &BackupRecord,
        install_dir: &Path,
    ) -> CoreResult<()> {
        let record = record.clone();
        let install_dir = install_dir.to_path_buf();

        let result = tokio::task::spawn_blocking(move || -> io::Result<()> {
            if install_dir.exists() {
                fs::remove_dir_all(&install_dir)?;
            }
            if record.had_payload {
                copy_dir(&record.path, &install_dir)?;
            }
            Ok(())
        })
        .await
        .map_err(|e| CoreError::from(io::Error::other(e)))?;

        result.map_err(|e| {
            CoreError::apply(workshop_id, format!("restoring backup failed: {e}"))
        })?;
        info!("Restored mod {workshop_id} from backup");
        Ok(())
    }

    /// Delete all but the newest backups of one mod. Returns how many went.
    pub async fn prune(&self, workshop_id: &str) -> CoreResult<usize> {
        let mod_dir = self.mod_dir(workshop_id);
        let retention = self.retention;

        let removed = tokio::task::spawn_blocking(move || -> io::Result<usize> {
            let backups = list_backups(&mod_dir)?;
            let excess = backups.len().saturating_sub(retention);
            for old in &backups[..excess] {
                debug!("Pruning old backup {}", old.display());
                fs::remove_dir_all(old)?;
            }
            Ok(excess)
        })
        .await
        .map_err(|e| CoreError::from(io::Error::other(e)))??;

        Ok(removed)
    }

    /// Backups of one mod, oldest first.
    pub fn list(&self, workshop_id: &str) -> CoreResult<Vec<PathBuf>> {
        Ok(list_backups(&self.mod_dir(workshop_id))?)
    }
}

fn unique_backup_dir(mod_dir: &Path) -> PathBuf {
    let stamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
    let mut candidate = mod_dir.join(&stamp);
    let mut n = 1;
    while candidate.exists() {
        candidate = mod_dir.join(format!("{stamp}-{n}"));
        n += 1;
    }
    candidate
}

fn write_backup(install_dir: &Path, dest: &Path) -> io::Result<bool> {
    fs::create_dir_all(dest)?;
    if !install_dir.exists() {
        return Ok(false);
    }
    copy_dir(install_dir, dest)?;
    Ok(true)
}

fn list_backups(mod_dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !mod_dir.exists() {
        return Ok(Vec::new());
    }

    let mut backups = Vec::new();
    for entry in fs::read_dir(mod_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            backups.push(entry.path());
        }
    }
    backups.sort();
    Ok(backups)
}

pub(crate) fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
