use crate::{ConfigError, ConfigErrorResult};

use serde::Deserialize;

pub const MIN_ADMIN_MESSAGE_CLEAR_SECS: u64 = 1;
pub const MAX_ADMIN_MESSAGE_CLEAR_SECS: u64 = 300;
pub const DEFAULT_ADMIN_MESSAGE_CLEAR_SECS: u64 = 11;

const DISCORD_WEBHOOK_PREFIXES: [&str; 2] = ["https://", "http://"];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Discord webhook url; a secret, never logged.
    pub discord_webhook: Option<String>,
    /// Show broadcasts and countdowns in game
    pub admin_messages: bool,
    /// How long an in-game message stays before it is cleared
    pub admin_message_clear_secs: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            discord_webhook: None,
            admin_messages: true,
            admin_message_clear_secs: DEFAULT_ADMIN_MESSAGE_CLEAR_SECS,
        }
    }
}

impl NotificationsConfig {
    pub fn validate(&self) -> ConfigErrorResult<()> {
        if let Some(url) = &self.discord_webhook
            && !DISCORD_WEBHOOK_PREFIXES
                .iter()
                .any(|prefix| url.starts_with(prefix))
        {
            return Err(ConfigError::notifications(
                "notifications.discord_webhook must be an http(s) url",
            ));
        }

        if self.admin_message_clear_secs < MIN_ADMIN_MESSAGE_CLEAR_SECS
            || self.admin_message_clear_secs > MAX_ADMIN_MESSAGE_CLEAR_SECS
        {
            return Err(ConfigError::notifications(format!(
                "notifications.admin_message_clear_secs must be {}-{}, got {}",
                MIN_ADMIN_MESSAGE_CLEAR_SECS,
                MAX_ADMIN_MESSAGE_CLEAR_SECS,
                self.admin_message_clear_secs
            )));
        }

        Ok(())
    }
}
