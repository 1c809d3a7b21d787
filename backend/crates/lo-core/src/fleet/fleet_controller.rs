//! Composition root of the engine.

use crate::fleet::event_router::route_events;
use crate::{
    Clock, CommandAck, CommandOrigin, CoreError, FleetConfig, FleetSnapshot, GameUpdateSource,
    ModEntry, ModUpdateCoordinator, ModUpdateResult, ModVersion, NameScanSettings, Notification,
    NotificationKind, NotificationSink, ProcessLauncher, RestartScheduler, Result as CoreResult,
    ServerUpdateOutcome, ShutdownCoordinator, ShutdownGuard, TileAction, TileCommand,
    TileNameScanner, TileRouter, TileSnapshot, TileSupervisor, WorkshopSource,
};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use futures::future::join_all;
use log::{debug, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// How long shutdown waits for queued notifications to drain.
const NOTIFICATION_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns every supervisor and background loop and is the only entry point
/// for commands. State leaves as immutable snapshots.
pub struct FleetController {
    tiles: TileRouter,
    coordinator: ModUpdateCoordinator,
    notifications: mpsc::UnboundedSender<Notification>,
    clock: Arc<dyn Clock>,
    next_restart: watch::Receiver<Option<NaiveDateTime>>,
    shutdown: ShutdownCoordinator,
    supervisor_tasks: Vec<JoinHandle<()>>,
    loop_tasks: Vec<JoinHandle<()>>,
    router_task: JoinHandle<()>,
    dispatch_task: JoinHandle<()>,
}

impl FleetController {
    /// Spawn every supervisor and loop. Without `game` the server install is
    /// never touched, only mods.
    pub async fn start(
        config: FleetConfig,
        launcher: Arc<dyn ProcessLauncher>,
        workshop: Arc<dyn WorkshopSource>,
        game: Option<Arc<dyn GameUpdateSource>>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> CoreResult<Self> {
        let mut seen = HashSet::new();
        if let Some(duplicate) = config.tiles.iter().find(|spec| !seen.insert(&spec.id)) {
            return Err(CoreError::duplicate_tile(&duplicate.id));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (notifications, notifications_rx) = mpsc::unbounded_channel();
        let shutdown = ShutdownCoordinator::new();

        let mut handles = Vec::with_capacity(config.tiles.len());
        let mut supervisor_tasks = Vec::with_capacity(config.tiles.len());
        for spec in config.tiles {
            let (handle, task) = TileSupervisor::spawn(
                spec,
                config.supervisor,
                launcher.clone(),
                clock.clone(),
                events_tx.clone(),
            );
            handles.push(handle);
            supervisor_tasks.push(task);
        }
        let tiles = TileRouter::new(handles);

        let mut coordinator =
            ModUpdateCoordinator::new(config.mods, workshop, tiles.clone(), events_tx.clone());
        if let Some(game) = game {
            coordinator = coordinator.with_game_updates(game);
        }
        for registration in config.registered_mods {
            coordinator
                .register(
                    &registration.workshop_id,
                    registration.tiles,
                    registration.installed,
                )
                .await?;
        }

        let mut loop_tasks = Vec::new();

        let next_restart = match config.schedule {
            Some(schedule) => {
                let (scheduler, next_restart) =
                    RestartScheduler::new(schedule, clock.clone(), events_tx.clone());
                loop_tasks.push(tokio::spawn(scheduler.run(shutdown.subscribe_guard())));
                next_restart
            }
            None => {
                info!("Scheduled restarts disabled");
                watch::channel(None).1
            }
        };

        loop_tasks.push(tokio::spawn(
            coordinator.clone().run(shutdown.subscribe_guard()),
        ));

        if let Some(name_scan) = config.name_scan {
            loop_tasks.push(tokio::spawn(scan_tile_names(
                name_scan,
                tiles.clone(),
                shutdown.subscribe_guard(),
            )));
        }

        drop(events_tx);
        let router_task = tokio::spawn(route_events(
            events_rx,
            tiles.clone(),
            notifications.clone(),
            clock.clone(),
        ));
        let dispatch_task = tokio::spawn(dispatch_notifications(notifications_rx, sink));

        info!("Fleet started with {} tile(s)", tiles.len());

        let controller = Self {
            tiles,
            coordinator,
            notifications,
            clock,
            next_restart,
            shutdown,
            supervisor_tasks,
            loop_tasks,
            router_task,
            dispatch_task,
        };

        if config.autostart {
            for (tile_id, result) in controller.start_all().await {
                if let Err(e) = result {
                    warn!("Autostart of tile {tile_id} failed: {e}");
                }
            }
        }

        Ok(controller)
    }

    /// Apply one operator action to one tile.
    pub async fn command(&self, tile_id: &str, action: TileAction) -> CoreResult<CommandAck> {
        let handle = self.tiles.get(tile_id)?;
        let origin = CommandOrigin::Manual;

        match action {
            TileAction::Start => handle.send(TileCommand::Start { origin }).await,
            TileAction::Stop => handle.send(TileCommand::Stop { origin }).await,
            TileAction::Restart => handle.send(TileCommand::Restart { origin }).await,
            TileAction::BroadcastMessage(message) => {
                self.broadcast(&message, &[tile_id.to_string()])
            }
        }
    }

    /// Send a player-facing message to `tile_ids`, or to every tile when
    /// empty. Nothing is sent unless every id is known.
    pub fn broadcast(&self, message: &str, tile_ids: &[String]) -> CoreResult<CommandAck> {
        let message = message.trim();
        if message.is_empty() {
            return Err(CoreError::invalid_command("broadcast message is empty"));
        }
        for tile_id in tile_ids {
            self.tiles.get(tile_id)?;
        }

        let now = self.clock.now();
        let notification = Notification::new(NotificationKind::Broadcast, message, now);
        if tile_ids.is_empty() {
            self.notify(notification);
        } else {
            for tile_id in tile_ids {
                self.notify(notification.clone().for_tile(tile_id));
            }
        }
        Ok(CommandAck::Applied)
    }

    /// Start every tile concurrently; each tile reports its own outcome.
    pub async fn start_all(&self) -> Vec<(String, CoreResult<CommandAck>)> {
        let starts = self.tiles.handles().map(|handle| async move {
            let result = handle
                .send(TileCommand::Start {
                    origin: CommandOrigin::Manual,
                })
                .await;
            (handle.id().to_string(), result)
        });
        join_all(starts).await
    }

    /// Run an update cycle now instead of waiting for the next poll.
    pub async fn check_mods(&self) -> CoreResult<Vec<ModUpdateResult>> {
        self.coordinator.run_cycle().await
    }

    /// Check the game server build now and update it if it is behind.
    pub async fn check_server(&self) -> CoreResult<ServerUpdateOutcome> {
        self.coordinator.run_server_cycle().await
    }

    pub async fn register_mod(
        &self,
        workshop_id: &str,
        tiles: Vec<String>,
        installed: Option<ModVersion>,
    ) -> CoreResult<ModEntry> {
        self.coordinator.register(workshop_id, tiles, installed).await
    }

    pub async fn remove_mod(&self, workshop_id: &str) -> CoreResult<ModEntry> {
        self.coordinator.remove(workshop_id).await
    }

    pub fn tile(&self, tile_id: &str) -> CoreResult<TileSnapshot> {
        Ok(self.tiles.get(tile_id)?.snapshot())
    }

    pub async fn snapshot(&self) -> FleetSnapshot {
        FleetSnapshot {
            tiles: self.tiles.snapshots(),
            mods: self.coordinator.entries().await,
            server_build: self.coordinator.server_build().await,
            next_restart_at: *self.next_restart.borrow(),
            update_in_progress: self.coordinator.is_cycle_running(),
            taken_at: self.clock.now(),
        }
    }

    /// Stop the background loops, then every tile regardless of holds.
    ///
    /// An update cycle that is applying files runs to completion first,
    /// because the coordinator loop only observes shutdown between cycles.
    pub async fn shutdown(self) {
        info!("Shutting down fleet");
        self.shutdown.shutdown();

        for task in self.loop_tasks {
            if let Err(e) = task.await {
                warn!("Background task ended abnormally: {e}");
            }
        }

        let stops = self
            .tiles
            .handles()
            .map(|handle| async move { (handle.id(), handle.send(TileCommand::Shutdown).await) });
        for (tile_id, result) in join_all(stops).await {
            if let Err(e) = result {
                debug!("Tile {tile_id} was already down: {e}");
            }
        }

        for task in self.supervisor_tasks {
            if let Err(e) = task.await {
                warn!("Supervisor task ended abnormally: {e}");
            }
        }

        drop(self.coordinator);
        drop(self.tiles);
        drop(self.notifications);

        let drained = tokio::time::timeout(NOTIFICATION_DRAIN_TIMEOUT, async {
            let _ = self.router_task.await;
            let _ = self.dispatch_task.await;
        })
        .await;
        if drained.is_err() {
            warn!("Pending notifications were dropped during shutdown");
        }

        info!("Fleet shut down");
    }

    fn notify(&self, notification: Notification) {
        let _ = self.notifications.send(notification);
    }
}

async fn dispatch_notifications(
    mut notifications: mpsc::UnboundedReceiver<Notification>,
    sink: Arc<dyn NotificationSink>,
) {
    while let Some(notification) = notifications.recv().await {
        if let Err(e) = sink.send(&notification).await {
            warn!("Notification via {} failed: {e}", sink.name());
        }
    }
}

async fn scan_tile_names(
    settings: NameScanSettings,
    tiles: TileRouter,
    mut shutdown: ShutdownGuard,
) {
    let mut scanner = TileNameScanner::new(settings.log_dir);
    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.wait() => break,
        }

        let scanned = tokio::task::spawn_blocking(move || {
            let names = scanner.scan();
            (scanner, names)
        })
        .await;

        let names = match scanned {
            Ok((returned, names)) => {
                scanner = returned;
                names
            }
            Err(e) => {
                warn!("Tile name scan task failed: {e}");
                break;
            }
        };

        match names {
            Ok(names) => {
                for (tile_id, name) in names {
                    if let Ok(handle) = tiles.get(&tile_id)
                        && let Err(e) = handle.post(TileCommand::Rename(name)).await
                    {
                        debug!("Could not rename tile {tile_id}: {e}");
                    }
                }
            }
            Err(e) => warn!("Scanning tile logs failed: {e}"),
        }
    }
}
