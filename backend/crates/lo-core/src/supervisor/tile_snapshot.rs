use crate::TileStatus;

use chrono::NaiveDateTime;
use serde::Serialize;

/// Read-only view of a tile, published by its supervisor after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileSnapshot {
    pub id: String,
    pub display_name: String,
    pub status: TileStatus,
    pub pid: Option<u32>,
    pub last_start_time: Option<NaiveDateTime>,
    pub last_exit_code: Option<i32>,
    pub consecutive_crash_count: u32,
    pub pending_restart_at: Option<NaiveDateTime>,
    pub update_hold: bool,
    /// A scheduled restart arrived during a hold and will run on release.
    pub deferred_restart: bool,
}

impl TileSnapshot {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: id.to_string(),
            status: TileStatus::Stopped,
            pid: None,
            last_start_time: None,
            last_exit_code: None,
            consecutive_crash_count: 0,
            pending_restart_at: None,
            update_hold: false,
            deferred_restart: false,
        }
    }

    /// No process is running, so files the tile reads can be replaced.
    pub fn is_quiesced(&self) -> bool {
        !self.status.has_process()
    }
}
