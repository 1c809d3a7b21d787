//! Composition root for the `lo-manager` binary: concrete Steam, Discord
//! and in-game message collaborators plus the configuration mapping.

pub mod admin_message_sink;
pub mod cli;
pub mod discord_sink;
pub mod error;
pub mod fleet_config;
pub mod logger;
pub mod mods_ledger;
pub mod retry;
pub mod sinks;
pub mod steam_game_server;
pub mod steam_workshop;

#[cfg(test)]
mod tests;

pub use admin_message_sink::AdminMessageSink;
pub use cli::Cli;
pub use discord_sink::DiscordSink;
pub use error::{Result, ServerError};
pub use fleet_config::{
    admin_message_targets, build_fleet_config, mod_settings, supervisor_settings, tile_process,
};
pub use mods_ledger::ModsLedger;
pub use retry::RetryConfig;
pub use sinks::notification_sink;
pub use steam_game_server::SteamGameServer;
pub use steam_workshop::{STEAM_API_URL, SteamWorkshop};
