use crate::{ConfigError, ConfigErrorResult};

use serde::Deserialize;

pub const MAX_HOUR: u32 = 23;
pub const MAX_NOTIFY_MINUTES: u32 = 24 * 60 - 1;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub enabled: bool,
    /// Local hours at which every tile restarts
    pub restart_hours: Vec<u32>,
    /// Countdown warnings, in minutes before each restart
    pub notify_minutes: Vec<u32>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            restart_hours: vec![0, 6, 12, 18],
            notify_minutes: vec![30, 15, 5, 1],
        }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> ConfigErrorResult<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.restart_hours.is_empty() {
            return Err(ConfigError::schedule(
                "schedule.restart_hours must not be empty while the schedule is enabled",
            ));
        }

        if let Some(hour) = self.restart_hours.iter().find(|h| **h > MAX_HOUR) {
            return Err(ConfigError::schedule(format!(
                "schedule.restart_hours entries must be 0-{MAX_HOUR}, got {hour}"
            )));
        }

        if let Some(minutes) = self
            .notify_minutes
            .iter()
            .find(|m| **m == 0 || **m > MAX_NOTIFY_MINUTES)
        {
            return Err(ConfigError::schedule(format!(
                "schedule.notify_minutes entries must be 1-{MAX_NOTIFY_MINUTES}, got {minutes}"
            )));
        }

        Ok(())
    }
}
