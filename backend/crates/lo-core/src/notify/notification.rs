use crate::ErrorKind;

use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TileStatus,
    TileCrashed,
    LaunchFailed,
    /// Staged warning before a scheduled restart
    Countdown,
    RestartDue,
    /// Operator message meant for players
    Broadcast,
    ModUpdateAvailable,
    ModUpdateFailed,
    ModUpdateFinished,
    /// Heads-up before tiles go down for an update
    UpdateWarning,
    ServerUpdate,
}

impl NotificationKind {
    /// Whether players on the affected tiles should see this in game.
    pub fn is_player_facing(self) -> bool {
        matches!(self, Self::Countdown | Self::Broadcast | Self::UpdateWarning)
    }
}

/// A self-contained message for an outbound transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    /// `None` means the whole fleet.
    pub tile_id: Option<String>,
    pub mod_id: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub message: String,
    pub at: NaiveDateTime,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>, at: NaiveDateTime) -> Self {
        Self {
            kind,
            tile_id: None,
            mod_id: None,
            error_kind: None,
            message: message.into(),
            at,
        }
    }

    pub fn for_tile(mut self, tile_id: impl Into<String>) -> Self {
        self.tile_id = Some(tile_id.into());
        self
    }

    pub fn for_mod(mut self, mod_id: impl Into<String>) -> Self {
        self.mod_id = Some(mod_id.into());
        self
    }

    pub fn with_error(mut self, kind: ErrorKind) -> Self {
        self.error_kind = Some(kind);
        self
    }
}
