use crate::{ProcessHandle, ProcessSpec, Result as CoreResult};

use std::time::Duration;

use async_trait::async_trait;
use log::warn;

/// How a process ended after a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    pub code: Option<i32>,
    /// The grace period ran out and the process was killed.
    pub forced: bool,
}

/// One running worker process, exclusively owned by its tile supervisor.
#[async_trait]
pub trait TileProcess: Send {
    fn pid(&self) -> Option<u32>;

    /// Non-blocking liveness probe. Records the exit code once the process
    /// has exited.
    fn is_alive(&mut self) -> bool;

    fn exit_code(&self) -> Option<i32>;

    /// Ask the process to stop (`graceful`) or kill it outright.
    fn terminate(&mut self, graceful: bool) -> CoreResult<()>;

    /// Wait up to `grace` for the process to exit, then kill it and wait
    /// for the kill to land.
    async fn wait_exit(&mut self, grace: Duration) -> CoreResult<ExitOutcome>;

    /// Graceful terminate followed by a bounded wait.
    async fn stop(&mut self, grace: Duration) -> CoreResult<ExitOutcome> {
        if let Err(e) = self.terminate(true) {
            warn!("Graceful terminate failed, waiting for exit anyway: {e}");
        }
        self.wait_exit(grace).await
    }
}

/// Starts tile processes. The supervisor only ever talks to this seam, so the
/// OS can be swapped for an in-memory double.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, tile_id: &str, spec: &ProcessSpec) -> CoreResult<Box<dyn TileProcess>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OsProcessLauncher;

impl ProcessLauncher for OsProcessLauncher {
    fn launch(&self, tile_id: &str, spec: &ProcessSpec) -> CoreResult<Box<dyn TileProcess>> {
        let handle = ProcessHandle::start(tile_id, spec)?;
        Ok(Box::new(handle))
    }
}
