mod backup_store;
mod game_update_source;
mod mod_entry;
mod mod_settings;
mod mod_update_coordinator;
mod mod_update_result;
mod mod_version;
mod workshop_source;

pub use backup_store::{BackupRecord, BackupStore};
pub use game_update_source::{GameBuild, GameUpdateSource, ServerUpdateOutcome};
pub use mod_entry::{ModEntry, ModStatus};
pub use mod_settings::ModSettings;
pub use mod_update_coordinator::ModUpdateCoordinator;
pub use mod_update_result::{ModUpdateOutcome, ModUpdateResult};
pub use mod_version::ModVersion;
pub use workshop_source::WorkshopSource;
