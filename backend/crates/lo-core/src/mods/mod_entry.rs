use crate::ModVersion;

use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModStatus {
    UpToDate,
    UpdateAvailable,
    /// A cycle is applying this mod; a backup exists or is being written.
    Updating,
    Failed,
}

/// One tracked workshop item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModEntry {
    pub workshop_id: String,
    pub installed_version: Option<ModVersion>,
    pub latest_known_version: Option<ModVersion>,
    pub status: ModStatus,
    pub backup_path: Option<PathBuf>,
    /// Tiles that load this mod. Empty means every tile.
    pub tiles: Vec<String>,
    pub last_error: Option<String>,
}

impl ModEntry {
    pub fn new(workshop_id: impl Into<String>, tiles: Vec<String>) -> Self {
        Self {
            workshop_id: workshop_id.into(),
            installed_version: None,
            latest_known_version: None,
            status: ModStatus::UpdateAvailable,
            backup_path: None,
            tiles,
            last_error: None,
        }
    }

    pub fn with_installed(mut self, version: Option<ModVersion>) -> Self {
        self.installed_version = version;
        self.status = match version {
            Some(_) => ModStatus::UpToDate,
            None => ModStatus::UpdateAvailable,
        };
        self
    }

    pub fn applies_to(&self, tile_id: &str) -> bool {
        self.tiles.is_empty() || self.tiles.iter().any(|t| t == tile_id)
    }
}
