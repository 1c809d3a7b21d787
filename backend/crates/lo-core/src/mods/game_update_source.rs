use crate::{ErrorKind, Result as CoreResult};

use async_trait::async_trait;
use serde::Serialize;

/// Installed and published build ids of the dedicated server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GameBuild {
    /// `None` when no install manifest was found.
    pub installed: Option<u64>,
    pub latest: u64,
}

impl GameBuild {
    pub fn needs_update(&self) -> bool {
        self.installed != Some(self.latest)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ServerUpdateOutcome {
    UpToDate { build: u64 },
    Updated { build: u64 },
    /// Shutdown arrived during the warning; nothing was held.
    Postponed { build: u64 },
    /// Tiles were restarted on the build already on disk.
    Failed { kind: ErrorKind, message: String },
}

impl ServerUpdateOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Where the dedicated server's own files come from.
///
/// `update` only runs while every tile is held, so it may rewrite any file
/// of the server install.
#[async_trait]
pub trait GameUpdateSource: Send + Sync {
    async fn check_build(&self) -> CoreResult<GameBuild>;

    async fn update(&self) -> CoreResult<()>;
}
