use crate::{ConfigError, ConfigErrorResult};

use serde::Deserialize;

pub const MIN_CHECK_INTERVAL_SECS: u64 = 60;
pub const MAX_CHECK_INTERVAL_SECS: u64 = 86_400;
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;

pub const MIN_TIMEOUT_SECS: u64 = 5;
pub const MAX_TIMEOUT_SECS: u64 = 7_200;
pub const DEFAULT_QUIESCE_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 600;

pub const MIN_BACKUP_RETENTION: usize = 1;
pub const MAX_BACKUP_RETENTION: usize = 100;
pub const DEFAULT_BACKUP_RETENTION: usize = 3;

pub const MAX_UPDATE_WARNING_SECS: u64 = 3_600;
pub const DEFAULT_UPDATE_WARNING_SECS: u64 = 300;

pub const DEFAULT_SERVER_CHECK_INTERVAL_SECS: u64 = 3_600;

pub const DEFAULT_APP_ID: u32 = 903_950;
pub const DEFAULT_SERVER_APP_ID: u32 = 920_720;
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 1_000;
pub const DEFAULT_BACKUP_DIR: &str = "backups";
pub const DEFAULT_STATE_FILE: &str = "mods_state.json";

/// Steam Workshop mods loaded by the tiles.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModsConfig {
    /// Workshop item ids, also passed to tiles as `-mods=`
    pub workshop_ids: Vec<String>,
    pub check_interval_secs: u64,
    /// Defaults to `<folder_path>/Mist/Content/Mods`
    pub mods_dir: Option<String>,
    /// Relative to the config directory unless absolute
    pub backup_dir: String,
    /// Installed versions, relative to the config directory unless absolute
    pub state_file: String,
    pub quiesce_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub backup_retention: usize,
    /// Directory containing the steamcmd executable
    pub steamcmd_path: String,
    pub app_id: u32,
    /// Minimum spacing between Workshop API requests
    pub request_delay_ms: u64,
    /// In-game warning before tiles go down for an update; 0 disables it
    pub update_warning_secs: u64,
    /// Game server build polling; 0 disables server updates
    pub server_check_interval_secs: u64,
    /// Steam app id of the dedicated server
    pub server_app_id: u32,
}

impl Default for ModsConfig {
    fn default() -> Self {
        Self {
            workshop_ids: Vec::new(),
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            mods_dir: None,
            backup_dir: String::from(DEFAULT_BACKUP_DIR),
            state_file: String::from(DEFAULT_STATE_FILE),
            quiesce_timeout_secs: DEFAULT_QUIESCE_TIMEOUT_SECS,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            backup_retention: DEFAULT_BACKUP_RETENTION,
            steamcmd_path: String::new(),
            app_id: DEFAULT_APP_ID,
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
            update_warning_secs: DEFAULT_UPDATE_WARNING_SECS,
            server_check_interval_secs: DEFAULT_SERVER_CHECK_INTERVAL_SECS,
            server_app_id: DEFAULT_SERVER_APP_ID,
        }
    }
}

impl ModsConfig {
    pub fn validate(&self) -> ConfigErrorResult<()> {
        if let Some(bad) = self
            .workshop_ids
            .iter()
            .find(|id| id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()))
        {
            return Err(ConfigError::mods(format!(
                "mods.workshop_ids entries must be numeric Workshop ids, got '{bad}'"
            )));
        }

        if !self.workshop_ids.is_empty() && self.steamcmd_path.trim().is_empty() {
            return Err(ConfigError::mods(
                "mods.steamcmd_path is required when mods.workshop_ids is set",
            ));
        }

        if self.check_interval_secs < MIN_CHECK_INTERVAL_SECS
            || self.check_interval_secs > MAX_CHECK_INTERVAL_SECS
        {
            return Err(ConfigError::mods(format!(
                "mods.check_interval_secs must be {}-{}, got {}",
                MIN_CHECK_INTERVAL_SECS, MAX_CHECK_INTERVAL_SECS, self.check_interval_secs
            )));
        }

        for (key, value) in [
            ("quiesce_timeout_secs", self.quiesce_timeout_secs),
            ("download_timeout_secs", self.download_timeout_secs),
        ] {
            if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&value) {
                return Err(ConfigError::mods(format!(
                    "mods.{key} must be {MIN_TIMEOUT_SECS}-{MAX_TIMEOUT_SECS}, got {value}"
                )));
            }
        }

        if self.backup_retention < MIN_BACKUP_RETENTION
            || self.backup_retention > MAX_BACKUP_RETENTION
        {
            return Err(ConfigError::mods(format!(
                "mods.backup_retention must be {}-{}, got {}",
                MIN_BACKUP_RETENTION, MAX_BACKUP_RETENTION, self.backup_retention
            )));
        }

        if self.update_warning_secs > MAX_UPDATE_WARNING_SECS {
            return Err(ConfigError::mods(format!(
                "mods.update_warning_secs must be at most {MAX_UPDATE_WARNING_SECS}, got {}",
                self.update_warning_secs
            )));
        }

        if self.server_check_interval_secs != 0
            && !(MIN_CHECK_INTERVAL_SECS..=MAX_CHECK_INTERVAL_SECS)
                .contains(&self.server_check_interval_secs)
        {
            return Err(ConfigError::mods(format!(
                "mods.server_check_interval_secs must be 0 or {}-{}, got {}",
                MIN_CHECK_INTERVAL_SECS, MAX_CHECK_INTERVAL_SECS, self.server_check_interval_secs
            )));
        }

        Ok(())
    }

    /// Server builds are only checked with steamcmd configured.
    pub fn server_updates_enabled(&self) -> bool {
        self.server_check_interval_secs > 0 && !self.steamcmd_path.trim().is_empty()
    }

    /// Comma-joined ids for the `-mods=` argument, `None` without mods.
    pub fn mods_arg(&self) -> Option<String> {
        (!self.workshop_ids.is_empty()).then(|| self.workshop_ids.join(","))
    }
}
