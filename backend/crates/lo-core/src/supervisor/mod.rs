mod supervisor_settings;
mod tile_command;
mod tile_handle;
mod tile_snapshot;
mod tile_spec;
mod tile_status;
mod tile_supervisor;

pub use supervisor_settings::SupervisorSettings;
pub use tile_command::{CommandAck, CommandOrigin, TileCommand};
pub use tile_handle::TileHandle;
pub use tile_snapshot::TileSnapshot;
pub use tile_spec::TileSpec;
pub use tile_status::TileStatus;
pub use tile_supervisor::TileSupervisor;

pub(crate) use tile_command::TileRequest;
