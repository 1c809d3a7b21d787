pub(crate) mod event_router;
mod fleet_config;
mod fleet_controller;
mod fleet_snapshot;
mod tile_action;
mod tile_router;

pub use fleet_config::{FleetConfig, ModRegistration, NameScanSettings};
pub use fleet_controller::FleetController;
pub use fleet_snapshot::FleetSnapshot;
pub use tile_action::TileAction;
pub use tile_router::TileRouter;
