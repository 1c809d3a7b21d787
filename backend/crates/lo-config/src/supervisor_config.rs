use crate::{ConfigError, ConfigErrorResult};

use serde::Deserialize;

pub const MIN_POLL_INTERVAL_MS: u64 = 100;
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

pub const MIN_GRACE_SECS: u64 = 1;
pub const MAX_GRACE_SECS: u64 = 600;
pub const DEFAULT_STARTUP_GRACE_SECS: u64 = 10;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;

pub const MAX_AUTO_RESTARTS: u32 = 100;
pub const DEFAULT_MAX_AUTO_RESTARTS: u32 = 5;
pub const DEFAULT_CRASH_RESET_SECS: u64 = 300;

pub const MIN_BACKOFF_MS: u64 = 100;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 5_000;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 120_000;

pub const MIN_NAME_SCAN_SECS: u64 = 5;
pub const MAX_NAME_SCAN_SECS: u64 = 3_600;
pub const DEFAULT_NAME_SCAN_SECS: u64 = 30;

/// Liveness polling, crash handling and stop timeouts for every tile.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub poll_interval_ms: u64,
    /// Time a fresh process stays `Starting` before it counts as running
    pub startup_grace_secs: u64,
    /// Time between the graceful stop signal and a forced kill
    pub shutdown_grace_secs: u64,
    /// Crash ceiling; 0 disables automatic restarts
    pub max_auto_restarts: u32,
    /// Stable running time that clears the crash counter
    pub crash_reset_secs: u64,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// 0 disables tile name scanning
    pub name_scan_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            startup_grace_secs: DEFAULT_STARTUP_GRACE_SECS,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
            max_auto_restarts: DEFAULT_MAX_AUTO_RESTARTS,
            crash_reset_secs: DEFAULT_CRASH_RESET_SECS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            name_scan_secs: DEFAULT_NAME_SCAN_SECS,
        }
    }
}

impl SupervisorConfig {
    pub fn validate(&self) -> ConfigErrorResult<()> {
        if self.poll_interval_ms < MIN_POLL_INTERVAL_MS
            || self.poll_interval_ms > MAX_POLL_INTERVAL_MS
        {
            return Err(ConfigError::config(format!(
                "supervisor.poll_interval_ms must be {}-{}, got {}",
                MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS, self.poll_interval_ms
            )));
        }

        for (key, value) in [
            ("startup_grace_secs", self.startup_grace_secs),
            ("shutdown_grace_secs", self.shutdown_grace_secs),
        ] {
            if !(MIN_GRACE_SECS..=MAX_GRACE_SECS).contains(&value) {
                return Err(ConfigError::config(format!(
                    "supervisor.{key} must be {MIN_GRACE_SECS}-{MAX_GRACE_SECS}, got {value}"
                )));
            }
        }

        if self.max_auto_restarts > MAX_AUTO_RESTARTS {
            return Err(ConfigError::config(format!(
                "supervisor.max_auto_restarts must be 0-{}, got {}",
                MAX_AUTO_RESTARTS, self.max_auto_restarts
            )));
        }

        if self.initial_backoff_ms < MIN_BACKOFF_MS {
            return Err(ConfigError::config(format!(
                "supervisor.initial_backoff_ms must be >= {}, got {}",
                MIN_BACKOFF_MS, self.initial_backoff_ms
            )));
        }

        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(ConfigError::config(format!(
                "supervisor.max_backoff_ms ({}) must be >= initial_backoff_ms ({})",
                self.max_backoff_ms, self.initial_backoff_ms
            )));
        }

        if self.name_scan_secs != 0
            && (self.name_scan_secs < MIN_NAME_SCAN_SECS
                || self.name_scan_secs > MAX_NAME_SCAN_SECS)
        {
            return Err(ConfigError::config(format!(
                "supervisor.name_scan_secs must be 0 (off) or {}-{}, got {}",
                MIN_NAME_SCAN_SECS, MAX_NAME_SCAN_SECS, self.name_scan_secs
            )));
        }

        Ok(())
    }
}
