//! Single-owner state machine for one tile.

use crate::supervisor::TileRequest;
use crate::{
    Clock, CommandAck, CommandOrigin, CoreError, FleetEvent, ProcessLauncher,
    Result as CoreResult, SupervisorSettings, TileCommand, TileHandle, TileProcess, TileSnapshot,
    TileSpec, TileStatus,
};

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const COMMAND_QUEUE_DEPTH: usize = 32;

/// Owns a tile's process and is the only writer of its status.
///
/// Commands and liveness polls are handled on one task, so transitions for a
/// tile are totally ordered without locks. Other tiles run their own loops.
pub struct TileSupervisor {
    spec: TileSpec,
    settings: SupervisorSettings,
    launcher: Arc<dyn ProcessLauncher>,
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<FleetEvent>,
    commands: mpsc::Receiver<TileRequest>,
    snapshot_tx: watch::Sender<TileSnapshot>,
    snapshot: TileSnapshot,
    process: Option<Box<dyn TileProcess>>,
    started_at: Option<Instant>,
    auto_restart_at: Option<Instant>,
    /// Set when a hold found the tile past the crash ceiling.
    held_at_ceiling: bool,
}

impl TileSupervisor {
    /// Spawn the supervisor loop and return its handle.
    pub fn spawn(
        spec: TileSpec,
        settings: SupervisorSettings,
        launcher: Arc<dyn ProcessLauncher>,
        clock: Arc<dyn Clock>,
        events: mpsc::UnboundedSender<FleetEvent>,
    ) -> (TileHandle, JoinHandle<()>) {
        let (command_tx, commands) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let snapshot = TileSnapshot::new(&spec.id);
        let (snapshot_tx, snapshot_rx) = watch::channel(snapshot.clone());
        let handle = TileHandle::new(spec.id.clone(), command_tx, snapshot_rx);

        let supervisor = Self {
            spec,
            settings,
            launcher,
            clock,
            events,
            commands,
            snapshot_tx,
            snapshot,
            process: None,
            started_at: None,
            auto_restart_at: None,
            held_at_ceiling: false,
        };

        let task = tokio::spawn(supervisor.run());
        (handle, task)
    }

    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!("Supervisor for tile {} started", self.spec.id);

        loop {
            let auto_restart_at = self.auto_restart_at;

            tokio::select! {
                request = self.commands.recv() => {
                    let Some(TileRequest { command, reply }) = request else {
                        self.shutdown().await;
                        break;
                    };

                    let is_shutdown = command == TileCommand::Shutdown;
                    let result = self.handle(command).await;
                    let _ = reply.send(result);

                    if is_shutdown {
                        break;
                    }
                }
                _ = ticker.tick() => self.poll(),
                _ = tokio::time::sleep_until(auto_restart_at.unwrap_or_else(Instant::now)),
                    if auto_restart_at.is_some() => self.auto_restart(),
            }
        }

        debug!("Supervisor for tile {} stopped", self.spec.id);
    }

    async fn handle(&mut self, command: TileCommand) -> CoreResult<CommandAck> {
        debug!("Tile {} handling {}", self.spec.id, command.name());

        match command {
            TileCommand::Start { origin } => self.start(origin),
            TileCommand::Stop { origin } => self.stop(origin).await,
            TileCommand::Restart { origin } => self.restart(origin).await,
            TileCommand::Hold => self.hold().await,
            TileCommand::Release { restart } => self.release(restart),
            TileCommand::SchedulePending { at } => {
                if self.snapshot.pending_restart_at == at {
                    return Ok(CommandAck::Unchanged);
                }
                self.snapshot.pending_restart_at = at;
                self.publish();
                Ok(CommandAck::Applied)
            }
            TileCommand::Rename(name) => {
                if name.is_empty() || self.snapshot.display_name == name {
                    return Ok(CommandAck::Unchanged);
                }
                info!("Tile {} is now named {name:?}", self.spec.id);
                self.snapshot.display_name = name;
                self.publish();
                Ok(CommandAck::Applied)
            }
            TileCommand::Shutdown => {
                self.shutdown().await;
                Ok(CommandAck::Applied)
            }
        }
    }

    fn start(&mut self, origin: CommandOrigin) -> CoreResult<CommandAck> {
        if self.snapshot.update_hold {
            return Err(CoreError::update_blocked(&self.spec.id));
        }
        if self.process.is_some() {
            return Ok(CommandAck::Unchanged);
        }

        if origin == CommandOrigin::Manual {
            self.snapshot.consecutive_crash_count = 0;
        }
        self.launch()?;
        Ok(CommandAck::Applied)
    }

    async fn stop(&mut self, origin: CommandOrigin) -> CoreResult<CommandAck> {
        if self.snapshot.update_hold && origin != CommandOrigin::Coordinator {
            return Err(CoreError::update_blocked(&self.spec.id));
        }

        let cancelled_auto = self.auto_restart_at.take().is_some();
        let cancelled_scheduled = self.snapshot.pending_restart_at.take().is_some();
        let had_pending = cancelled_auto || cancelled_scheduled;

        match self.snapshot.status {
            TileStatus::Stopped | TileStatus::UpdateBlocked if !had_pending => {
                Ok(CommandAck::Unchanged)
            }
            TileStatus::Stopped | TileStatus::UpdateBlocked => {
                self.publish();
                Ok(CommandAck::Applied)
            }
            _ => {
                self.stop_process().await;
                self.transition(TileStatus::Stopped);
                Ok(CommandAck::Applied)
            }
        }
    }

    async fn restart(&mut self, origin: CommandOrigin) -> CoreResult<CommandAck> {
        if self.snapshot.update_hold {
            return match origin {
                CommandOrigin::Manual => Err(CoreError::update_blocked(&self.spec.id)),
                CommandOrigin::Scheduled => {
                    info!(
                        "Tile {} is held for a mod update, deferring scheduled restart",
                        self.spec.id
                    );
                    self.snapshot.deferred_restart = true;
                    self.publish();
                    Ok(CommandAck::Deferred)
                }
                CommandOrigin::Coordinator => self.release(true),
            };
        }

        if self.process.is_none() {
            if origin == CommandOrigin::Scheduled {
                // Tiles an operator stopped, or that hit the crash ceiling,
                // stay down through scheduled windows.
                if self.snapshot.pending_restart_at.take().is_some() {
                    self.publish();
                }
                return Ok(CommandAck::Unchanged);
            }
            return self.start(origin);
        }

        self.transition(TileStatus::Restarting);
        self.stop_process().await;
        self.snapshot.pending_restart_at = None;
        self.launch()?;
        Ok(CommandAck::Applied)
    }

    async fn hold(&mut self) -> CoreResult<CommandAck> {
        if self.snapshot.update_hold {
            return Ok(CommandAck::Unchanged);
        }

        self.snapshot.update_hold = true;
        self.auto_restart_at = None;
        self.held_at_ceiling = self.snapshot.status == TileStatus::Crashed
            && self.snapshot.consecutive_crash_count > self.settings.max_auto_restarts;

        if self.process.is_some() {
            info!("Quiescing tile {} for a mod update", self.spec.id);
            self.transition(TileStatus::Restarting);
            self.stop_process().await;
        }

        self.transition(TileStatus::UpdateBlocked);
        Ok(CommandAck::Applied)
    }

    fn release(&mut self, restart: bool) -> CoreResult<CommandAck> {
        if !self.snapshot.update_hold {
            return Ok(CommandAck::Unchanged);
        }

        let deferred = std::mem::take(&mut self.snapshot.deferred_restart);
        self.snapshot.update_hold = false;

        if std::mem::take(&mut self.held_at_ceiling) {
            info!(
                "Tile {} was past its crash ceiling before the hold, leaving it down",
                self.spec.id
            );
            if deferred {
                self.snapshot.pending_restart_at = None;
            }
            self.transition(TileStatus::Crashed);
            return Ok(CommandAck::Applied);
        }

        self.transition(TileStatus::Stopped);

        if restart || deferred {
            if deferred {
                self.snapshot.pending_restart_at = None;
            }
            self.launch()?;
        }
        Ok(CommandAck::Applied)
    }

    async fn shutdown(&mut self) {
        self.auto_restart_at = None;
        self.held_at_ceiling = false;
        self.snapshot.update_hold = false;
        self.snapshot.deferred_restart = false;
        self.snapshot.pending_restart_at = None;
        self.stop_process().await;
        self.transition(TileStatus::Stopped);
    }

    fn poll(&mut self) {
        let Some(process) = self.process.as_mut() else {
            return;
        };

        if !process.is_alive() {
            let exit_code = process.exit_code();
            self.process = None;
            self.started_at = None;
            self.on_crash(exit_code);
            return;
        }

        let uptime = self.started_at.map(|at| at.elapsed()).unwrap_or_default();
        match self.snapshot.status {
            TileStatus::Starting if uptime >= self.settings.startup_grace => {
                self.transition(TileStatus::Running);
            }
            TileStatus::Running
                if self.snapshot.consecutive_crash_count > 0
                    && uptime >= self.settings.crash_reset_after =>
            {
                info!(
                    "Tile {} stable for {}s, clearing crash count",
                    self.spec.id,
                    uptime.as_secs()
                );
                self.snapshot.consecutive_crash_count = 0;
                self.publish();
            }
            _ => {}
        }
    }

    fn on_crash(&mut self, exit_code: Option<i32>) {
        self.snapshot.consecutive_crash_count += 1;
        self.snapshot.last_exit_code = exit_code;
        self.snapshot.pid = None;

        let crashes = self.snapshot.consecutive_crash_count;
        let will_restart = crashes <= self.settings.max_auto_restarts;

        if will_restart {
            let delay = self.settings.backoff(crashes);
            warn!(
                "Tile {} crashed (exit code {exit_code:?}), restart {crashes}/{} in {}ms",
                self.spec.id,
                self.settings.max_auto_restarts,
                delay.as_millis()
            );
            self.auto_restart_at = Some(Instant::now() + delay);
        } else {
            error!(
                "Tile {} crashed {crashes} times in a row, leaving it down until started manually",
                self.spec.id
            );
        }

        self.emit(FleetEvent::TileCrashed {
            tile_id: self.spec.id.clone(),
            display_name: self.snapshot.display_name.clone(),
            exit_code,
            consecutive_crashes: crashes,
            will_restart,
        });
        self.transition(TileStatus::Crashed);
    }

    fn auto_restart(&mut self) {
        self.auto_restart_at = None;
        if self.snapshot.status != TileStatus::Crashed || self.snapshot.update_hold {
            return;
        }

        info!("Automatically restarting tile {}", self.spec.id);
        if let Err(e) = self.launch() {
            warn!("Automatic restart of tile {} failed: {e}", self.spec.id);
        }
    }

    fn launch(&mut self) -> CoreResult<()> {
        self.auto_restart_at = None;

        match self.launcher.launch(&self.spec.id, &self.spec.process) {
            Ok(process) => {
                self.snapshot.pid = process.pid();
                self.snapshot.last_start_time = Some(self.clock.now());
                self.process = Some(process);
                self.started_at = Some(Instant::now());
                self.transition(TileStatus::Starting);
                Ok(())
            }
            Err(e) => {
                error!("{e}");
                self.snapshot.pid = None;
                self.emit(FleetEvent::LaunchFailed {
                    tile_id: self.spec.id.clone(),
                    display_name: self.snapshot.display_name.clone(),
                    message: e.to_string(),
                });
                self.transition(TileStatus::Stopped);
                Err(e)
            }
        }
    }

    async fn stop_process(&mut self) {
        let Some(mut process) = self.process.take() else {
            return;
        };

        match process.stop(self.settings.shutdown_grace).await {
            Ok(outcome) => {
                if outcome.forced {
                    warn!("Tile {} had to be killed", self.spec.id);
                }
                self.snapshot.last_exit_code = outcome.code;
            }
            Err(e) => warn!("Stopping tile {} failed: {e}", self.spec.id),
        }

        self.snapshot.pid = None;
        self.started_at = None;
    }

    fn transition(&mut self, to: TileStatus) {
        let from = self.snapshot.status;
        self.snapshot.status = to;

        if from != to {
            info!("Tile {} {from} -> {to}", self.spec.id);
            self.emit(FleetEvent::TileStatusChanged {
                tile_id: self.spec.id.clone(),
                display_name: self.snapshot.display_name.clone(),
                from,
                to,
            });
        }
        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot.clone());
    }

    fn emit(&self, event: FleetEvent) {
        let _ = self.events.send(event);
    }
}
