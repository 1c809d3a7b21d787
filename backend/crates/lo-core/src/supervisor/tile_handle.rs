use crate::supervisor::TileRequest;
use crate::{CommandAck, CoreError, Result as CoreResult, TileCommand, TileSnapshot};

use tokio::sync::{mpsc, oneshot, watch};

/// Cloneable address of one tile supervisor.
///
/// Commands travel over the supervisor's queue and are applied one at a time
/// by its loop; state comes back through a watch channel, so callers never
/// touch the supervisor's internals.
#[derive(Clone)]
pub struct TileHandle {
    id: String,
    commands: mpsc::Sender<TileRequest>,
    snapshots: watch::Receiver<TileSnapshot>,
}

impl TileHandle {
    pub(crate) fn new(
        id: String,
        commands: mpsc::Sender<TileRequest>,
        snapshots: watch::Receiver<TileSnapshot>,
    ) -> Self {
        Self {
            id,
            commands,
            snapshots,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Queue a command and wait for the supervisor to apply it.
    pub async fn send(&self, command: TileCommand) -> CoreResult<CommandAck> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(TileRequest { command, reply })
            .await
            .map_err(|_| CoreError::supervisor_gone(&self.id))?;

        response
            .await
            .map_err(|_| CoreError::supervisor_gone(&self.id))?
    }

    /// Queue a command without waiting for it to be applied. Commands posted
    /// from one place are still applied in order.
    pub async fn post(&self, command: TileCommand) -> CoreResult<()> {
        let (reply, _) = oneshot::channel();
        self.commands
            .send(TileRequest { command, reply })
            .await
            .map_err(|_| CoreError::supervisor_gone(&self.id))
    }

    pub fn snapshot(&self) -> TileSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TileSnapshot> {
        self.snapshots.clone()
    }
}
