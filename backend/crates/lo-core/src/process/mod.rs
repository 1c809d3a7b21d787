mod launcher;
mod process_handle;
mod process_spec;

pub use launcher::{ExitOutcome, OsProcessLauncher, ProcessLauncher, TileProcess};
pub use process_handle::ProcessHandle;
pub use process_spec::ProcessSpec;
