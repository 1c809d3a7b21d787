use crate::{GameBuild, ModEntry, TileSnapshot};

use chrono::NaiveDateTime;
use serde::Serialize;

/// Point-in-time copy of the whole fleet for API and UI consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FleetSnapshot {
    pub tiles: Vec<TileSnapshot>,
    pub mods: Vec<ModEntry>,
    /// `None` until a game server check has run.
    pub server_build: Option<GameBuild>,
    pub next_restart_at: Option<NaiveDateTime>,
    pub update_in_progress: bool,
    pub taken_at: NaiveDateTime,
}

impl FleetSnapshot {
    pub fn tile(&self, tile_id: &str) -> Option<&TileSnapshot> {
        self.tiles.iter().find(|tile| tile.id == tile_id)
    }

    pub fn mod_entry(&self, workshop_id: &str) -> Option<&ModEntry> {
        self.mods.iter().find(|entry| entry.workshop_id == workshop_id)
    }
}
