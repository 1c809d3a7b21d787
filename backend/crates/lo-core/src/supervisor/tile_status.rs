use std::fmt;

use serde::Serialize;

/// Lifecycle state of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TileStatus {
    /// No process; waits for a start command
    Stopped,
    /// Process spawned, inside the startup grace period
    Starting,
    /// Process alive past the startup grace period
    Running,
    /// Stopping the current process before starting a new one
    Restarting,
    /// Process exited without being asked to
    Crashed,
    /// Quiesced under a mod-update hold
    UpdateBlocked,
}

impl TileStatus {
    /// States in which the tile owns a live process.
    pub fn has_process(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Restarting)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Restarting => "restarting",
            Self::Crashed => "crashed",
            Self::UpdateBlocked => "update_blocked",
        }
    }
}

impl fmt::Display for TileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
