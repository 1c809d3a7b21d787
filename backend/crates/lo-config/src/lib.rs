mod config;
mod error;
mod log_level;
mod logging_config;
mod mods_config;
mod notifications_config;
mod schedule_config;
mod server_config;
mod supervisor_config;

pub use config::Config;
pub use error::{ConfigError, ConfigErrorResult};
pub use log_level::LogLevel;
pub use logging_config::LoggingConfig;
pub use mods_config::ModsConfig;
pub use notifications_config::NotificationsConfig;
pub use schedule_config::ScheduleConfig;
pub use server_config::ServerConfig;
pub use supervisor_config::SupervisorConfig;

const CONFIG_DIR_ENV: &str = "LO_CONFIG_DIR";
const DEFAULT_CONFIG_DIR: &str = ".lo";
const CONFIG_FILE_NAME: &str = "config.toml";

const DEFAULT_LOG_LEVEL_STRING: &str = "info";
const DEFAULT_LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;
const DEFAULT_LOG_DIRECTORY: &str = "log";

#[cfg(test)]
mod tests;
