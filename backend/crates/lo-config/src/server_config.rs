use crate::{ConfigError, ConfigErrorResult};

use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const MIN_TILE_COUNT: u32 = 1;
pub const MAX_TILE_COUNT: u32 = 64;
pub const DEFAULT_TILE_COUNT: u32 = 1;

pub const MIN_PORT: u16 = 1024;
pub const DEFAULT_START_PORT: u16 = 5555;
pub const DEFAULT_START_QUERY_PORT: u16 = 27015;

pub const MIN_SLOTS: u32 = 1;
pub const MAX_SLOTS: u32 = 500;
pub const DEFAULT_SLOTS: u32 = 100;

pub const DEFAULT_IDENTIFIER_PREFIX: &str = "Disc0oasis";
pub const DEFAULT_EXECUTABLE: &str = "Mist/Binaries/Win64/MistServer-Win64-Shipping.exe";

/// Name of the game directory inside the install root.
const GAME_DIR: &str = "Mist";

/// Game install and the command line every tile is launched with.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Install root that contains the `Mist` directory.
    pub folder_path: String,
    /// Server executable, relative to `folder_path`.
    pub executable: String,
    pub tile_count: u32,
    pub identifier_prefix: String,
    /// Tile `i` listens on `start_port + i`.
    pub start_port: u16,
    pub start_query_port: u16,
    pub slots: u32,
    /// Backend API url passed as `-backendapiurloverride`.
    pub backend: String,
    pub customer_key: String,
    pub provider_key: String,
    pub connection_ip: String,
    pub extra_args: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            folder_path: String::new(),
            executable: String::from(DEFAULT_EXECUTABLE),
            tile_count: DEFAULT_TILE_COUNT,
            identifier_prefix: String::from(DEFAULT_IDENTIFIER_PREFIX),
            start_port: DEFAULT_START_PORT,
            start_query_port: DEFAULT_START_QUERY_PORT,
            slots: DEFAULT_SLOTS,
            backend: String::new(),
            customer_key: String::new(),
            provider_key: String::new(),
            connection_ip: String::new(),
            extra_args: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> ConfigErrorResult<()> {
        let required = [
            ("folder_path", &self.folder_path),
            ("backend", &self.backend),
            ("customer_key", &self.customer_key),
            ("provider_key", &self.provider_key),
            ("connection_ip", &self.connection_ip),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| *key)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::server(format!(
                "missing required settings: server.{}",
                missing.join(", server.")
            )));
        }

        if self.tile_count < MIN_TILE_COUNT || self.tile_count > MAX_TILE_COUNT {
            return Err(ConfigError::server(format!(
                "server.tile_count must be {}-{}, got {}",
                MIN_TILE_COUNT, MAX_TILE_COUNT, self.tile_count
            )));
        }

        if self.identifier_prefix.is_empty()
            || !self
                .identifier_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::server(format!(
                "server.identifier_prefix must be non-empty letters, digits or '_', got '{}'",
                self.identifier_prefix
            )));
        }

        Self::validate_port_range("start_port", self.start_port, self.tile_count)?;
        Self::validate_port_range("start_query_port", self.start_query_port, self.tile_count)?;

        let game_ports = self.start_port..self.start_port.saturating_add(self.tile_count as u16);
        let query_ports =
            self.start_query_port..self.start_query_port.saturating_add(self.tile_count as u16);
        if game_ports.start < query_ports.end && query_ports.start < game_ports.end {
            return Err(ConfigError::server(
                "server.start_port and server.start_query_port ranges overlap",
            ));
        }

        if self.slots < MIN_SLOTS || self.slots > MAX_SLOTS {
            return Err(ConfigError::server(format!(
                "server.slots must be {}-{}, got {}",
                MIN_SLOTS, MAX_SLOTS, self.slots
            )));
        }

        Ok(())
    }

    fn validate_port_range(key: &str, start: u16, tile_count: u32) -> ConfigErrorResult<()> {
        let last = u32::from(start) + tile_count.saturating_sub(1);
        if start < MIN_PORT || last > u32::from(u16::MAX) {
            return Err(ConfigError::server(format!(
                "server.{key} must be >= {MIN_PORT} and leave room for {tile_count} tile(s), got {start}"
            )));
        }
        Ok(())
    }

    /// `Disc0oasis0`, `Disc0oasis1`, ...
    pub fn tile_id(&self, index: u32) -> String {
        format!("{}{index}", self.identifier_prefix)
    }

    pub fn tile_ids(&self) -> Vec<String> {
        (0..self.tile_count).map(|i| self.tile_id(i)).collect()
    }

    pub fn executable_path(&self) -> PathBuf {
        Path::new(&self.folder_path).join(&self.executable)
    }

    /// Tiles run from the executable's own directory.
    pub fn working_dir(&self) -> PathBuf {
        let exe = self.executable_path();
        exe.parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(&self.folder_path))
    }

    pub fn game_dir(&self) -> PathBuf {
        Path::new(&self.folder_path).join(GAME_DIR)
    }

    /// Where tiles write their `.log` files.
    pub fn log_dir(&self) -> PathBuf {
        self.game_dir().join("Saved").join("Logs")
    }

    /// Per-tile `Game.ini` that carries in-game admin messages.
    pub fn admin_config_path(&self, tile_id: &str) -> PathBuf {
        self.game_dir()
            .join("Saved")
            .join("Config")
            .join("WindowsServer")
            .join(tile_id)
            .join("Game.ini")
    }
}
