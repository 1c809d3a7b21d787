use crate::{ModUpdateResult, ModVersion, ServerUpdateOutcome, TileStatus};

use chrono::NaiveDateTime;
use serde::Serialize;

/// Everything the engine's loops report upward to the fleet controller.
///
/// Supervisors, the restart scheduler and the mod coordinator only ever emit
/// these; the controller decides which tiles and sinks they reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FleetEvent {
    TileStatusChanged {
        tile_id: String,
        display_name: String,
        from: TileStatus,
        to: TileStatus,
    },
    TileCrashed {
        tile_id: String,
        display_name: String,
        exit_code: Option<i32>,
        consecutive_crashes: u32,
        will_restart: bool,
    },
    LaunchFailed {
        tile_id: String,
        display_name: String,
        message: String,
    },
    Countdown {
        minutes_remaining: u32,
        restart_at: NaiveDateTime,
    },
    RestartDue {
        restart_at: NaiveDateTime,
    },
    ModUpdateAvailable {
        workshop_id: String,
        installed: Option<ModVersion>,
        latest: ModVersion,
    },
    ModUpdateCheckFailed {
        workshop_id: String,
        message: String,
    },
    ModUpdateFinished {
        results: Vec<ModUpdateResult>,
    },
    /// Tiles are about to be held for an update.
    UpdateWarning {
        target: UpdateTarget,
        /// `None` means every tile.
        tile_ids: Option<Vec<String>>,
        seconds: u64,
    },
    ServerUpdateAvailable {
        installed: Option<u64>,
        latest: u64,
    },
    ServerUpdateCheckFailed {
        message: String,
    },
    ServerUpdateFinished {
        outcome: ServerUpdateOutcome,
    },
}

/// What an update cycle replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateTarget {
    Mods,
    Server,
}
