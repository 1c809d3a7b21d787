//! Supervision and mod-update engine for a fleet of game-server tiles.
//!
//! Every tile is owned by a [`TileSupervisor`] task; the [`RestartScheduler`]
//! and [`ModUpdateCoordinator`] run as their own timer loops and only emit
//! events. The [`FleetController`] routes those events to tiles and sinks and
//! is the single entry point for operator commands.

pub mod clock;
pub mod error;
pub mod events;
pub mod fleet;
pub mod mods;
pub mod notify;
pub mod process;
pub mod scheduler;
pub mod shutdown_coordinator;
pub mod shutdown_guard;
pub mod supervisor;
pub mod tile_names;

pub use clock::{Clock, SystemClock};
pub use error::{CoreError, ErrorKind, Result};
pub use events::{FleetEvent, UpdateTarget};
pub use fleet::{
    FleetConfig, FleetController, FleetSnapshot, ModRegistration, NameScanSettings, TileAction,
    TileRouter,
};
pub use mods::{
    BackupRecord, BackupStore, GameBuild, GameUpdateSource, ModEntry, ModSettings, ModStatus,
    ModUpdateCoordinator, ModUpdateOutcome, ModUpdateResult, ModVersion, ServerUpdateOutcome,
    WorkshopSource,
};
pub use notify::{FanoutSink, LogSink, Notification, NotificationKind, NotificationSink};
pub use process::{
    ExitOutcome, OsProcessLauncher, ProcessHandle, ProcessLauncher, ProcessSpec, TileProcess,
};
pub use scheduler::{
    CountdownNotice, RestartPlan, RestartSchedule, RestartScheduler, next_restart_time,
};
pub use shutdown_coordinator::ShutdownCoordinator;
pub use shutdown_guard::ShutdownGuard;
pub use supervisor::{
    CommandAck, CommandOrigin, SupervisorSettings, TileCommand, TileHandle, TileSnapshot,
    TileSpec, TileStatus, TileSupervisor,
};
pub use tile_names::TileNameScanner;

#[cfg(test)]
mod tests;
