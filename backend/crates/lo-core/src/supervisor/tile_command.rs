use crate::Result as CoreResult;

use chrono::NaiveDateTime;
use serde::Serialize;
use tokio::sync::oneshot;

/// Who asked for a lifecycle change. Holds treat each origin differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOrigin {
    Manual,
    Scheduled,
    Coordinator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileCommand {
    Start { origin: CommandOrigin },
    Stop { origin: CommandOrigin },
    Restart { origin: CommandOrigin },
    /// Quiesce the tile and block restarts until `Release`.
    Hold,
    /// Clear a hold; start the tile again when `restart` is set or a
    /// scheduled restart was deferred while held.
    Release { restart: bool },
    /// Record (or clear) the upcoming scheduled restart time.
    SchedulePending { at: Option<NaiveDateTime> },
    Rename(String),
    /// Stop the process regardless of holds and end the supervisor loop.
    Shutdown,
}

impl TileCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Stop { .. } => "stop",
            Self::Restart { .. } => "restart",
            Self::Hold => "hold",
            Self::Release { .. } => "release",
            Self::SchedulePending { .. } => "schedule",
            Self::Rename(_) => "rename",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Successful outcome of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAck {
    Applied,
    /// Nothing to do in the current state.
    Unchanged,
    /// Accepted but postponed until the update hold clears.
    Deferred,
}

pub(crate) struct TileRequest {
    pub command: TileCommand,
    pub reply: oneshot::Sender<CoreResult<CommandAck>>,
}
