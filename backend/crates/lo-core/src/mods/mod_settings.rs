use std::path::PathBuf;
use std::time::Duration;

const STAGING_DIR: &str = ".staging";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModSettings {
    /// Installed payloads live at `<mods_dir>/<workshop_id>`.
    pub mods_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub check_interval: Duration,
    pub quiesce_timeout: Duration,
    pub download_timeout: Duration,
    /// Backups kept per mod after a successful apply.
    pub backup_retention: usize,
    /// Players are warned this long before tiles are held for an update.
    /// Zero holds at once.
    pub update_warning: Duration,
    /// Game server build polling, when a game update source is attached.
    pub server_check_interval: Duration,
}

impl ModSettings {
    pub fn new(mods_dir: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            mods_dir: mods_dir.into(),
            backup_dir: backup_dir.into(),
            check_interval: Duration::from_secs(300),
            quiesce_timeout: Duration::from_secs(120),
            download_timeout: Duration::from_secs(600),
            backup_retention: 3,
            update_warning: Duration::ZERO,
            server_check_interval: Duration::from_secs(3600),
        }
    }

    pub fn install_dir(&self, workshop_id: &str) -> PathBuf {
        self.mods_dir.join(workshop_id)
    }

    pub fn staging_dir(&self, workshop_id: &str) -> PathBuf {
        self.staging_root().join(workshop_id)
    }

    pub fn staging_root(&self) -> PathBuf {
        self.mods_dir.join(STAGING_DIR)
    }
}
