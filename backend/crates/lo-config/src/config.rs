use crate::{
    CONFIG_DIR_ENV, CONFIG_FILE_NAME, ConfigError, ConfigErrorResult, DEFAULT_CONFIG_DIR,
    LoggingConfig, ModsConfig, NotificationsConfig, ScheduleConfig, ServerConfig,
    SupervisorConfig,
};

use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub supervisor: SupervisorConfig,
    pub schedule: ScheduleConfig,
    pub mods: ModsConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load config from the default directory.
    ///
    /// Loading order:
    /// 1. Check for LO_CONFIG_DIR env var, else use ./.lo/
    /// 2. Auto-create config directory if it doesn't exist
    /// 3. Load config.toml if it exists, else use defaults
    /// 4. Apply LO_* environment variable overrides
    ///
    /// Does NOT validate - call validate() after load().
    pub fn load() -> ConfigErrorResult<Self> {
        Self::load_from(&Self::config_dir()?)
    }

    /// Same as [`Config::load`] with an explicit directory (`--config-dir`).
    pub fn load_from(config_dir: &Path) -> ConfigErrorResult<Self> {
        if !config_dir.exists() {
            std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::Io {
                path: config_dir.to_path_buf(),
                source: e,
            })?;
        }

        let config_path = config_dir.join(CONFIG_FILE_NAME);

        let mut config = if config_path.exists() {
            Self::load_toml(&config_path)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    fn load_toml(path: &Path) -> ConfigErrorResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Toml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the config directory.
    /// Priority: LO_CONFIG_DIR env var > ./.lo/ (relative to cwd)
    pub fn config_dir() -> ConfigErrorResult<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }

        let cwd = std::env::current_dir()
            .map_err(|_| ConfigError::config("Cannot determine current working directory"))?;
        Ok(cwd.join(DEFAULT_CONFIG_DIR))
    }

    /// Validate all configuration.
    /// Call after load() to catch all errors at startup.
    pub fn validate(&self) -> ConfigErrorResult<()> {
        self.server.validate()?;
        self.supervisor.validate()?;
        self.schedule.validate()?;
        self.mods.validate()?;
        self.notifications.validate()?;

        // A tile may use the whole grace before it is killed, and the hold
        // still has to see it gone.
        if self.mods.quiesce_timeout_secs <= self.supervisor.shutdown_grace_secs {
            return Err(ConfigError::mods(format!(
                "mods.quiesce_timeout_secs ({}) must be greater than supervisor.shutdown_grace_secs ({})",
                self.mods.quiesce_timeout_secs, self.supervisor.shutdown_grace_secs
            )));
        }
        Ok(())
    }

    /// Installed mod payloads, `<folder_path>/Mist/Content/Mods` unless set.
    pub fn mods_dir(&self) -> PathBuf {
        match &self.mods.mods_dir {
            Some(dir) => PathBuf::from(dir),
            None => self.server.game_dir().join("Content").join("Mods"),
        }
    }

    pub fn backup_dir(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(&self.mods.backup_dir)
    }

    pub fn state_file(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(&self.mods.state_file)
    }

    pub fn log_dir(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(&self.logging.dir)
    }

    /// Log configuration summary (NEVER logs secrets).
    pub fn log_summary(&self) {
        info!("Configuration loaded:");
        info!(
            "  server: {} tile(s) {}0.. from {} (ports {}+, query {}+, {} slots)",
            self.server.tile_count,
            self.server.identifier_prefix,
            self.server.executable_path().display(),
            self.server.start_port,
            self.server.start_query_port,
            self.server.slots
        );
        info!(
            "  server keys: customer={}, provider={}",
            Self::presence(&self.server.customer_key),
            Self::presence(&self.server.provider_key)
        );

        info!(
            "  supervisor: poll={}ms, grace={}s/{}s, crashes={} (reset {}s), backoff={}ms..{}ms",
            self.supervisor.poll_interval_ms,
            self.supervisor.startup_grace_secs,
            self.supervisor.shutdown_grace_secs,
            self.supervisor.max_auto_restarts,
            self.supervisor.crash_reset_secs,
            self.supervisor.initial_backoff_ms,
            self.supervisor.max_backoff_ms
        );

        if self.schedule.enabled {
            info!(
                "  schedule: hours={:?}, warnings={:?}min",
                self.schedule.restart_hours, self.schedule.notify_minutes
            );
        } else {
            info!("  schedule: disabled");
        }

        info!(
            "  mods: {} registered, check every {}s, keep {} backup(s)",
            self.mods.workshop_ids.len(),
            self.mods.check_interval_secs,
            self.mods.backup_retention
        );
        if self.mods.server_updates_enabled() {
            info!(
                "  server updates: app {} checked every {}s, warn players {}s ahead",
                self.mods.server_app_id,
                self.mods.server_check_interval_secs,
                self.mods.update_warning_secs
            );
        } else {
            info!("  server updates: disabled");
        }

        info!(
            "  notifications: discord={}, admin messages={} ({}s)",
            if self.notifications.discord_webhook.is_some() {
                "configured"
            } else {
                "off"
            },
            self.notifications.admin_messages,
            self.notifications.admin_message_clear_secs
        );

        info!(
            "  logging: {} (colored: {})",
            *self.logging.level, self.logging.colored
        );
    }

    fn presence(value: &str) -> &'static str {
        if value.is_empty() { "missing" } else { "set" }
    }

    fn apply_env_overrides(&mut self) {
        // Server
        Self::apply_env_string("LO_SERVER_FOLDER_PATH", &mut self.server.folder_path);
        Self::apply_env_string("LO_SERVER_EXECUTABLE", &mut self.server.executable);
        Self::apply_env_parse("LO_SERVER_TILE_COUNT", &mut self.server.tile_count);
        Self::apply_env_string(
            "LO_SERVER_IDENTIFIER_PREFIX",
            &mut self.server.identifier_prefix,
        );
        Self::apply_env_parse("LO_SERVER_START_PORT", &mut self.server.start_port);
        Self::apply_env_parse(
            "LO_SERVER_START_QUERY_PORT",
            &mut self.server.start_query_port,
        );
        Self::apply_env_parse("LO_SERVER_SLOTS", &mut self.server.slots);
        Self::apply_env_string("LO_SERVER_BACKEND", &mut self.server.backend);
        Self::apply_env_string("LO_SERVER_CUSTOMER_KEY", &mut self.server.customer_key);
        Self::apply_env_string("LO_SERVER_PROVIDER_KEY", &mut self.server.provider_key);
        Self::apply_env_string("LO_SERVER_CONNECTION_IP", &mut self.server.connection_ip);

        // Supervisor
        Self::apply_env_parse(
            "LO_SUPERVISOR_POLL_INTERVAL_MS",
            &mut self.supervisor.poll_interval_ms,
        );
        Self::apply_env_parse(
            "LO_SUPERVISOR_SHUTDOWN_GRACE_SECS",
            &mut self.supervisor.shutdown_grace_secs,
        );
        Self::apply_env_parse(
            "LO_SUPERVISOR_MAX_AUTO_RESTARTS",
            &mut self.supervisor.max_auto_restarts,
        );
        Self::apply_env_parse(
            "LO_SUPERVISOR_CRASH_RESET_SECS",
            &mut self.supervisor.crash_reset_secs,
        );

        // Schedule
        Self::apply_env_bool("LO_SCHEDULE_ENABLED", &mut self.schedule.enabled);
        Self::apply_env_list("LO_SCHEDULE_RESTART_HOURS", &mut self.schedule.restart_hours);
        Self::apply_env_list(
            "LO_SCHEDULE_NOTIFY_MINUTES",
            &mut self.schedule.notify_minutes,
        );

        // Mods
        Self::apply_env_list("LO_MODS_WORKSHOP_IDS", &mut self.mods.workshop_ids);
        Self::apply_env_parse(
            "LO_MODS_CHECK_INTERVAL_SECS",
            &mut self.mods.check_interval_secs,
        );
        Self::apply_env_option_string("LO_MODS_DIR", &mut self.mods.mods_dir);
        Self::apply_env_string("LO_MODS_STEAMCMD_PATH", &mut self.mods.steamcmd_path);
        Self::apply_env_parse(
            "LO_MODS_BACKUP_RETENTION",
            &mut self.mods.backup_retention,
        );
        Self::apply_env_parse(
            "LO_MODS_UPDATE_WARNING_SECS",
            &mut self.mods.update_warning_secs,
        );
        Self::apply_env_parse(
            "LO_MODS_SERVER_CHECK_INTERVAL_SECS",
            &mut self.mods.server_check_interval_secs,
        );

        // Notifications
        Self::apply_env_option_string(
            "LO_DISCORD_WEBHOOK",
            &mut self.notifications.discord_webhook,
        );
        Self::apply_env_bool("LO_ADMIN_MESSAGES", &mut self.notifications.admin_messages);

        // Logging
        Self::apply_env_parse("LO_LOG_LEVEL", &mut self.logging.level);
        Self::apply_env_bool("LO_LOG_COLORED", &mut self.logging.colored);
        Self::apply_env_string("LO_LOG_DIR", &mut self.logging.dir);
        Self::apply_env_option_string("LO_LOG_FILE", &mut self.logging.file);
    }

    /// Helper: Apply environment variable override for String values
    fn apply_env_string(var_name: &str, target: &mut String) {
        if let Ok(val) = std::env::var(var_name) {
            *target = val;
        }
    }

    /// Helper: Apply environment variable override for bool values (accepts "true"/"1")
    fn apply_env_bool(var_name: &str, target: &mut bool) {
        if let Ok(val) = std::env::var(var_name) {
            *target = val == "true" || val == "1";
        }
    }

    /// Helper: Apply environment variable override for parseable values
    fn apply_env_parse<T: std::str::FromStr>(var_name: &str, target: &mut T) {
        if let Ok(val) = std::env::var(var_name)
            && let Ok(parsed) = val.parse()
        {
            *target = parsed;
        }
    }

    /// Helper: Apply a comma-separated list; ignored if any item fails to parse
    fn apply_env_list<T: std::str::FromStr>(var_name: &str, target: &mut Vec<T>) {
        if let Ok(val) = std::env::var(var_name) {
            let parsed: Result<Vec<T>, _> = val
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::parse)
                .collect();
            if let Ok(items) = parsed {
                *target = items;
            }
        }
    }

    /// Helper: Apply environment variable override for Option<String> values
    fn apply_env_option_string(var_name: &str, target: &mut Option<String>) {
        if let Ok(val) = std::env::var(var_name) {
            *target = Some(val);
        }
    }
}
