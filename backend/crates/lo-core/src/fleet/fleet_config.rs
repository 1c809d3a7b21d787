use crate::{ModSettings, ModVersion, RestartSchedule, SupervisorSettings, TileSpec};

use std::path::PathBuf;
use std::time::Duration;

/// A mod to track from startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModRegistration {
    pub workshop_id: String,
    /// Empty means every tile.
    pub tiles: Vec<String>,
    pub installed: Option<ModVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameScanSettings {
    pub log_dir: PathBuf,
    pub interval: Duration,
}

/// Everything the engine needs, handed over once at startup.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub tiles: Vec<TileSpec>,
    pub supervisor: SupervisorSettings,
    /// `None` disables scheduled restarts.
    pub schedule: Option<RestartSchedule>,
    pub mods: ModSettings,
    pub registered_mods: Vec<ModRegistration>,
    pub name_scan: Option<NameScanSettings>,
    /// Start every tile as soon as the fleet is up.
    pub autostart: bool,
}
