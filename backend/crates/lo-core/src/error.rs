use crate::TileStatus;

use std::panic::Location;
use std::path::PathBuf;
use std::result::Result as StdResult;

use error_location::ErrorLocation;
use serde::Serialize;
use thiserror::Error;

/// Coarse classification used by notifications and callers that only need
/// to know which part of the engine failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Launch,
    Command,
    UpdateCheck,
    Backup,
    Apply,
    Internal,
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to launch tile {tile_id}: {message} {location}")]
    Launch {
        tile_id: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
        location: ErrorLocation,
    },

    #[error("Unknown tile {tile_id} {location}")]
    UnknownTile {
        tile_id: String,
        location: ErrorLocation,
    },

    #[error("Tile {tile_id} is held for a mod update {location}")]
    UpdateBlocked {
        tile_id: String,
        location: ErrorLocation,
    },

    #[error("Tile {tile_id} cannot {action} while {status} {location}")]
    InvalidTransition {
        tile_id: String,
        status: TileStatus,
        action: &'static str,
        location: ErrorLocation,
    },

    #[error("A mod update cycle is already running {location}")]
    UpdateInProgress { location: ErrorLocation },

    #[error("Unknown mod {workshop_id} {location}")]
    UnknownMod {
        workshop_id: String,
        location: ErrorLocation,
    },

    #[error("Mod {workshop_id} is already registered {location}")]
    DuplicateMod {
        workshop_id: String,
        location: ErrorLocation,
    },

    #[error("Version check failed for mod {workshop_id}: {message} {location}")]
    UpdateCheck {
        workshop_id: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Backup of mod {workshop_id} to {path} failed: {source} {location}")]
    Backup {
        workshop_id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Applying update for mod {workshop_id} failed: {message} {location}")]
    Apply {
        workshop_id: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Game server build check failed: {message} {location}")]
    ServerCheck {
        message: String,
        location: ErrorLocation,
    },

    #[error("Updating the game server failed: {message} {location}")]
    ServerUpdate {
        message: String,
        location: ErrorLocation,
    },

    #[error("Tiles did not quiesce within {timeout_secs}s: {tiles:?} {location}")]
    QuiesceTimeout {
        tiles: Vec<String>,
        timeout_secs: u64,
        location: ErrorLocation,
    },

    #[error("Invalid restart schedule: {message} {location}")]
    Schedule {
        message: String,
        location: ErrorLocation,
    },

    #[error("Tile {tile_id} is configured more than once {location}")]
    DuplicateTile {
        tile_id: String,
        location: ErrorLocation,
    },

    #[error("Invalid command: {message} {location}")]
    InvalidCommand {
        message: String,
        location: ErrorLocation,
    },

    #[error("Notification sink {sink} failed: {message} {location}")]
    Notify {
        sink: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Supervisor for tile {tile_id} is no longer running {location}")]
    SupervisorGone {
        tile_id: String,
        location: ErrorLocation,
    },

    #[error("IO error: {source} {location}")]
    Io {
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },
}

impl CoreError {
    #[track_caller]
    pub fn launch<S: Into<String>>(
        tile_id: &str,
        message: S,
        source: Option<std::io::Error>,
    ) -> Self {
        Self::Launch {
            tile_id: tile_id.to_string(),
            message: message.into(),
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn unknown_tile(tile_id: &str) -> Self {
        Self::UnknownTile {
            tile_id: tile_id.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn update_blocked(tile_id: &str) -> Self {
        Self::UpdateBlocked {
            tile_id: tile_id.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn invalid_transition(tile_id: &str, status: TileStatus, action: &'static str) -> Self {
        Self::InvalidTransition {
            tile_id: tile_id.to_string(),
            status,
            action,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn update_in_progress() -> Self {
        Self::UpdateInProgress {
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn unknown_mod(workshop_id: &str) -> Self {
        Self::UnknownMod {
            workshop_id: workshop_id.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn duplicate_mod(workshop_id: &str) -> Self {
        Self::DuplicateMod {
            workshop_id: workshop_id.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn update_check<S: Into<String>>(workshop_id: &str, message: S) -> Self {
        Self::UpdateCheck {
            workshop_id: workshop_id.to_string(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn backup(workshop_id: &str, path: PathBuf, source: std::io::Error) -> Self {
        Self::Backup {
            workshop_id: workshop_id.to_string(),
            path,
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn apply<S: Into<String>>(workshop_id: &str, message: S) -> Self {
        Self::Apply {
            workshop_id: workshop_id.to_string(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn server_check<S: Into<String>>(message: S) -> Self {
        Self::ServerCheck {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn server_update<S: Into<String>>(message: S) -> Self {
        Self::ServerUpdate {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn quiesce_timeout(tiles: Vec<String>, timeout_secs: u64) -> Self {
        Self::QuiesceTimeout {
            tiles,
            timeout_secs,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn schedule<S: Into<String>>(message: S) -> Self {
        Self::Schedule {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn duplicate_tile(tile_id: &str) -> Self {
        Self::DuplicateTile {
            tile_id: tile_id.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn invalid_command<S: Into<String>>(message: S) -> Self {
        Self::InvalidCommand {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn notify<S: Into<String>>(sink: &str, message: S) -> Self {
        Self::Notify {
            sink: sink.to_string(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn supervisor_gone(tile_id: &str) -> Self {
        Self::SupervisorGone {
            tile_id: tile_id.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Launch { .. } => ErrorKind::Launch,
            Self::UnknownTile { .. }
            | Self::UpdateBlocked { .. }
            | Self::InvalidTransition { .. }
            | Self::UpdateInProgress { .. }
            | Self::UnknownMod { .. }
            | Self::DuplicateMod { .. }
            | Self::DuplicateTile { .. }
            | Self::InvalidCommand { .. } => ErrorKind::Command,
            Self::UpdateCheck { .. } | Self::ServerCheck { .. } => ErrorKind::UpdateCheck,
            Self::Backup { .. } => ErrorKind::Backup,
            Self::Apply { .. } | Self::ServerUpdate { .. } | Self::QuiesceTimeout { .. } => {
                ErrorKind::Apply
            }
            Self::Schedule { .. }
            | Self::Notify { .. }
            | Self::SupervisorGone { .. }
            | Self::Io { .. } => ErrorKind::Internal,
        }
    }

    /// Whether the next poll or command may succeed without intervention.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::UpdateCheck { .. }
                | Self::ServerCheck { .. }
                | Self::UpdateInProgress { .. }
                | Self::QuiesceTimeout { .. }
                | Self::Notify { .. }
        )
    }

    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::Launch { .. } => {
                "The server executable could not be started. \
                   Check the install path and permissions, then issue start again."
            }
            Self::UpdateBlocked { .. } => {
                "A mod update is being applied to this tile. \
                   It will restart automatically when the update finishes."
            }
            Self::UpdateInProgress { .. } => {
                "A mod update is already running. Wait for it to finish."
            }
            Self::UpdateCheck { .. } => {
                "Steam Workshop could not be reached. The next poll will retry."
            }
            Self::Backup { .. } => {
                "The mod backup could not be written. \
                   Check free disk space and permissions on the backup directory."
            }
            Self::Apply { .. } => {
                "The mod update could not be installed and the previous version was restored."
            }
            Self::ServerUpdate { .. } => {
                "steamcmd could not update the server install. \
                   Tiles were restarted on the build already on disk."
            }
            Self::QuiesceTimeout { .. } => {
                "Some tiles did not stop in time, so the update was skipped. It will be retried."
            }
            _ => "An unexpected error occurred. Please check the logs for details.",
        }
    }
}

impl From<std::io::Error> for CoreError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

pub type Result<T> = StdResult<T, CoreError>;
