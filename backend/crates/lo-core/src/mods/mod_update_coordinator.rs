//! Mod update cycle: check, warn, hold, backup, apply, release.
//!
//! Only one cycle runs at a time process-wide, and game server updates share
//! the same slot. Tiles are quiesced before any backup is taken, so the backup
//! reflects exactly what the tiles last loaded, and no installed file changes
//! while a tile could be reading it.

use crate::{
    BackupRecord, BackupStore, CoreError, FleetEvent, GameBuild, GameUpdateSource, ModEntry,
    ModSettings, ModStatus, ModUpdateOutcome, ModUpdateResult, ModVersion, Result as CoreResult,
    ServerUpdateOutcome, ShutdownGuard, TileCommand, TileRouter, UpdateTarget, WorkshopSource,
};

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use log::{debug, error, info, warn};
use tokio::sync::{RwLock, mpsc};
use tokio::time::{MissedTickBehavior, timeout};

/// Clears the process-wide cycle flag when the cycle ends, however it ends.
struct CycleGuard<'a>(&'a AtomicBool);

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> CoreResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CoreError::update_in_progress())?;
        Ok(Self(flag))
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct ModUpdateCoordinator {
    settings: ModSettings,
    workshop: Arc<dyn WorkshopSource>,
    game: Option<Arc<dyn GameUpdateSource>>,
    server_build: Arc<RwLock<Option<GameBuild>>>,
    backups: BackupStore,
    tiles: TileRouter,
    entries: Arc<RwLock<BTreeMap<String, ModEntry>>>,
    cycle_running: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<FleetEvent>,
}

impl ModUpdateCoordinator {
    pub fn new(
        settings: ModSettings,
        workshop: Arc<dyn WorkshopSource>,
        tiles: TileRouter,
        events: mpsc::UnboundedSender<FleetEvent>,
    ) -> Self {
        let backups = BackupStore::new(settings.backup_dir.clone(), settings.backup_retention);
        Self {
            settings,
            workshop,
            game: None,
            server_build: Arc::new(RwLock::new(None)),
            backups,
            tiles,
            entries: Arc::new(RwLock::new(BTreeMap::new())),
            cycle_running: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    /// Also keep the game server itself current, polled on
    /// `server_check_interval`.
    pub fn with_game_updates(mut self, game: Arc<dyn GameUpdateSource>) -> Self {
        self.game = Some(game);
        self
    }

    /// Track a mod. `tiles` empty means every tile loads it.
    pub async fn register(
        &self,
        workshop_id: &str,
        tiles: Vec<String>,
        installed: Option<ModVersion>,
    ) -> CoreResult<ModEntry> {
        if let Some(unknown) = tiles.iter().find(|t| !self.tiles.contains(t)) {
            return Err(CoreError::unknown_tile(unknown));
        }

        let mut entries = self.entries.write().await;
        if entries.contains_key(workshop_id) {
            return Err(CoreError::duplicate_mod(workshop_id));
        }

        let entry = ModEntry::new(workshop_id, tiles).with_installed(installed);
        info!(
            "Registered mod {workshop_id} (installed version {:?})",
            entry.installed_version
        );
        entries.insert(workshop_id.to_string(), entry.clone());
        Ok(entry)
    }

    pub async fn remove(&self, workshop_id: &str) -> CoreResult<ModEntry> {
        let mut entries = self.entries.write().await;
        if self.is_cycle_running() {
            return Err(CoreError::update_in_progress());
        }

        let entry = entries
            .remove(workshop_id)
            .ok_or_else(|| CoreError::unknown_mod(workshop_id))?;
        info!("Removed mod {workshop_id}");
        Ok(entry)
    }

    pub async fn entries(&self) -> Vec<ModEntry> {
        self.entries.read().await.values().cloned().collect()
    }

    pub async fn entry(&self, workshop_id: &str) -> Option<ModEntry> {
        self.entries.read().await.get(workshop_id).cloned()
    }

    pub fn is_cycle_running(&self) -> bool {
        self.cycle_running.load(Ordering::Acquire)
    }

    /// Last game server build check, if any ran.
    pub async fn server_build(&self) -> Option<GameBuild> {
        *self.server_build.read().await
    }

    /// Poll on the configured intervals until shutdown. The first checks run
    /// immediately so missing mods are installed at startup.
    pub async fn run(self, mut shutdown: ShutdownGuard) {
        let mut mod_ticker = tokio::time::interval(self.settings.check_interval);
        mod_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut server_ticker = tokio::time::interval(self.settings.server_check_interval);
        server_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let server_updates = self.game.is_some();

        loop {
            let target = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = server_ticker.tick(), if server_updates => UpdateTarget::Server,
                _ = mod_ticker.tick() => UpdateTarget::Mods,
            };

            match target {
                UpdateTarget::Server => self.poll_server(&mut shutdown).await,
                UpdateTarget::Mods => self.poll_mods(&mut shutdown).await,
            }
        }
    }

    async fn poll_mods(&self, shutdown: &mut ShutdownGuard) {
        match self.mod_cycle(Some(shutdown)).await {
            Ok(results) if !results.is_empty() => {
                let updated = results.iter().filter(|r| r.is_success()).count();
                info!("Mod update cycle finished: {updated}/{} updated", results.len());
            }
            Ok(_) => {}
            Err(CoreError::UpdateInProgress { .. }) => {
                debug!("Skipping mod poll, a cycle is already running");
            }
            Err(e) => warn!("Mod update cycle failed: {e}"),
        }
    }

    async fn poll_server(&self, shutdown: &mut ShutdownGuard) {
        match self.server_cycle(Some(shutdown)).await {
            Ok(_) => {}
            Err(CoreError::UpdateInProgress { .. }) => {
                debug!("Skipping server poll, a cycle is already running");
            }
            Err(e) => warn!("Game server update cycle failed: {e}"),
        }
    }

    /// One full cycle. Returns a result per mod that needed updating.
    pub async fn run_cycle(&self) -> CoreResult<Vec<ModUpdateResult>> {
        self.mod_cycle(None).await
    }

    /// Check the game server build and, when it is behind, update it with
    /// every tile held.
    pub async fn run_server_cycle(&self) -> CoreResult<ServerUpdateOutcome> {
        self.server_cycle(None).await
    }

    async fn mod_cycle(
        &self,
        shutdown: Option<&mut ShutdownGuard>,
    ) -> CoreResult<Vec<ModUpdateResult>> {
        let _cycle = CycleGuard::acquire(&self.cycle_running)?;

        let candidates = self.check().await;
        if candidates.is_empty() {
            debug!("All mods up to date");
            return Ok(Vec::new());
        }

        let affected = self.affected_tiles(&candidates).await;
        if !self.warn_players(UpdateTarget::Mods, &affected, shutdown).await {
            info!("Shutdown during the update warning, leaving mods for the next run");
            return Ok(Vec::new());
        }

        info!(
            "Updating {} mod(s), holding tiles {affected:?}",
            candidates.len()
        );

        let mut results = Vec::with_capacity(candidates.len());
        match self.hold(&affected).await {
            Ok(()) => {
                for (workshop_id, latest) in &candidates {
                    let outcome = self.update_one(workshop_id, *latest).await;
                    results.push(ModUpdateResult {
                        workshop_id: workshop_id.clone(),
                        outcome,
                    });
                }
            }
            Err(e) => {
                error!("{e}");
                for (workshop_id, _) in &candidates {
                    self.mark_failed(workshop_id, &e).await;
                    results.push(ModUpdateResult {
                        workshop_id: workshop_id.clone(),
                        outcome: failed(&e),
                    });
                }
            }
        }

        self.release(&affected).await;

        let _ = self.events.send(FleetEvent::ModUpdateFinished {
            results: results.clone(),
        });
        Ok(results)
    }

    async fn server_cycle(
        &self,
        shutdown: Option<&mut ShutdownGuard>,
    ) -> CoreResult<ServerUpdateOutcome> {
        let Some(game) = self.game.clone() else {
            return Err(CoreError::invalid_command(
                "game server updates are not configured",
            ));
        };
        let _cycle = CycleGuard::acquire(&self.cycle_running)?;

        let build = match game.check_build().await {
            Ok(build) => build,
            Err(e) => {
                warn!("{e}");
                let _ = self.events.send(FleetEvent::ServerUpdateCheckFailed {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };
        *self.server_build.write().await = Some(build);

        if !build.needs_update() {
            debug!("Game server is on the latest build {}", build.latest);
            return Ok(ServerUpdateOutcome::UpToDate {
                build: build.latest,
            });
        }

        info!(
            "Game server update available: {:?} -> {}",
            build.installed, build.latest
        );
        let _ = self.events.send(FleetEvent::ServerUpdateAvailable {
            installed: build.installed,
            latest: build.latest,
        });

        let affected: Vec<String> = self.tiles.ids().map(String::from).collect();
        if !self.warn_players(UpdateTarget::Server, &affected, shutdown).await {
            info!("Shutdown during the update warning, leaving the server update for the next run");
            return Ok(ServerUpdateOutcome::Postponed {
                build: build.latest,
            });
        }

        let outcome = match self.hold(&affected).await {
            Ok(()) => match timeout(self.settings.download_timeout, game.update()).await {
                Ok(Ok(())) => {
                    *self.server_build.write().await = Some(GameBuild {
                        installed: Some(build.latest),
                        latest: build.latest,
                    });
                    info!("Game server updated to build {}", build.latest);
                    ServerUpdateOutcome::Updated { build: build.latest }
                }
                Ok(Err(e)) => {
                    error!("{e}");
                    server_failed(&e)
                }
                Err(_) => {
                    let e = CoreError::server_update(format!(
                        "timed out after {}s",
                        self.settings.download_timeout.as_secs()
                    ));
                    error!("{e}");
                    server_failed(&e)
                }
            },
            Err(e) => {
                error!("{e}");
                server_failed(&e)
            }
        };

        self.release(&affected).await;

        let _ = self.events.send(FleetEvent::ServerUpdateFinished {
            outcome: outcome.clone(),
        });
        Ok(outcome)
    }

    /// Announce the coming restart and wait out the warning period. Returns
    /// false if shutdown was requested meanwhile.
    async fn warn_players(
        &self,
        target: UpdateTarget,
        affected: &[String],
        shutdown: Option<&mut ShutdownGuard>,
    ) -> bool {
        let warning = self.settings.update_warning;
        if warning.is_zero() {
            return true;
        }

        let anyone_playing = affected.iter().any(|tile_id| {
            self.tiles
                .get(tile_id)
                .is_ok_and(|handle| handle.snapshot().status.has_process())
        });
        if !anyone_playing {
            debug!("No affected tile is up, skipping the update warning");
            return true;
        }

        info!(
            "Warning players, holding tiles for the {target:?} update in {}s",
            warning.as_secs()
        );
        let tile_ids = (affected.len() != self.tiles.len()).then(|| affected.to_vec());
        let _ = self.events.send(FleetEvent::UpdateWarning {
            target,
            tile_ids,
            seconds: warning.as_secs(),
        });

        match shutdown {
            Some(shutdown) => {
                tokio::select! {
                    _ = tokio::time::sleep(warning) => true,
                    _ = shutdown.wait() => false,
                }
            }
            None => {
                tokio::time::sleep(warning).await;
                true
            }
        }
    }

    /// Refresh latest versions; returns the mods whose install is behind.
    async fn check(&self) -> Vec<(String, ModVersion)> {
        let ids: Vec<String> = self.entries.read().await.keys().cloned().collect();
        let mut candidates = Vec::new();

        for workshop_id in ids {
            let checked = self.workshop.check_version(&workshop_id).await;

            let mut entries = self.entries.write().await;
            let Some(entry) = entries.get_mut(&workshop_id) else {
                continue;
            };

            match checked {
                Ok(latest) => {
                    let newly_seen = entry.latest_known_version != Some(latest)
                        || entry.status != ModStatus::UpdateAvailable;
                    entry.latest_known_version = Some(latest);

                    if entry.installed_version == Some(latest) {
                        entry.status = ModStatus::UpToDate;
                        entry.last_error = None;
                        continue;
                    }

                    entry.status = ModStatus::UpdateAvailable;
                    if newly_seen {
                        info!(
                            "Mod {workshop_id} has an update: {:?} -> {latest}",
                            entry.installed_version
                        );
                        let _ = self.events.send(FleetEvent::ModUpdateAvailable {
                            workshop_id: workshop_id.clone(),
                            installed: entry.installed_version,
                            latest,
                        });
                    }
                    candidates.push((workshop_id, latest));
                }
                Err(e) => {
                    warn!("{e}");
                    entry.status = ModStatus::Failed;
                    entry.last_error = Some(e.to_string());
                    let _ = self.events.send(FleetEvent::ModUpdateCheckFailed {
                        workshop_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        candidates
    }

    async fn affected_tiles(&self, candidates: &[(String, ModVersion)]) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut affected = BTreeSet::new();

        for (workshop_id, _) in candidates {
            let Some(entry) = entries.get(workshop_id) else {
                continue;
            };
            affected.extend(
                self.tiles
                    .ids()
                    .filter(|tile_id| entry.applies_to(tile_id))
                    .map(String::from),
            );
        }

        affected.into_iter().collect()
    }

    /// Put every affected tile on hold and wait until none has a process.
    async fn hold(&self, affected: &[String]) -> CoreResult<()> {
        let holds = affected
            .iter()
            .map(|tile_id| self.tiles.send(tile_id, TileCommand::Hold));

        let acks = timeout(self.settings.quiesce_timeout, join_all(holds)).await;
        if let Ok(acks) = acks {
            for (tile_id, ack) in affected.iter().zip(acks) {
                if let Err(e) = ack {
                    warn!("Hold on tile {tile_id} failed: {e}");
                }
            }
        }

        let not_quiesced: Vec<String> = affected
            .iter()
            .filter(|tile_id| {
                self.tiles.get(tile_id).map_or(true, |handle| {
                    let snapshot = handle.snapshot();
                    !(snapshot.update_hold && snapshot.is_quiesced())
                })
            })
            .cloned()
            .collect();

        if not_quiesced.is_empty() {
            Ok(())
        } else {
            Err(CoreError::quiesce_timeout(
                not_quiesced,
                self.settings.quiesce_timeout.as_secs(),
            ))
        }
    }

    async fn release(&self, affected: &[String]) {
        let releases = affected
            .iter()
            .map(|tile_id| self.tiles.send(tile_id, TileCommand::Release { restart: true }));

        for (tile_id, ack) in affected.iter().zip(join_all(releases).await) {
            if let Err(e) = ack {
                warn!("Release of tile {tile_id} failed: {e}");
            }
        }
    }

    async fn update_one(&self, workshop_id: &str, latest: ModVersion) -> ModUpdateOutcome {
        let install_dir = self.settings.install_dir(workshop_id);
        self.update_entry(workshop_id, |entry| entry.status = ModStatus::Updating)
            .await;

        let record = match self.backups.backup(workshop_id, &install_dir).await {
            Ok(record) => record,
            Err(e) => {
                error!("{e}");
                self.mark_failed(workshop_id, &e).await;
                return failed(&e);
            }
        };
        self.update_entry(workshop_id, |entry| {
            entry.backup_path = Some(record.path.clone())
        })
        .await;

        if let Err(e) = self.apply(workshop_id, &install_dir, &record).await {
            error!("{e}");
            self.mark_failed(workshop_id, &e).await;
            return failed(&e);
        }

        self.update_entry(workshop_id, |entry| {
            entry.installed_version = Some(latest);
            entry.status = ModStatus::UpToDate;
            entry.last_error = None;
        })
        .await;
        info!("Mod {workshop_id} updated to version {latest}");

        match self.backups.prune(workshop_id).await {
            Ok(0) => {}
            Ok(removed) => {
                debug!("Pruned {removed} old backup(s) of mod {workshop_id}");
                self.repoint_backup(workshop_id).await;
            }
            Err(e) => warn!("Pruning backups of mod {workshop_id} failed: {e}"),
        }

        ModUpdateOutcome::Updated { version: latest }
    }

    /// Keep `backup_path` on a backup that still exists after pruning: the
    /// newest one left, or none.
    async fn repoint_backup(&self, workshop_id: &str) {
        let remaining = match self.backups.list(workshop_id) {
            Ok(remaining) => remaining,
            Err(e) => {
                warn!("Listing backups of mod {workshop_id} failed: {e}");
                Vec::new()
            }
        };

        self.update_entry(workshop_id, |entry| {
            let kept = entry
                .backup_path
                .as_ref()
                .is_some_and(|path| remaining.contains(path));
            if !kept {
                entry.backup_path = remaining.last().cloned();
            }
        })
        .await;
    }

    /// Download into staging, then swap staging into place. The install is
    /// only touched by the swap; a failed swap restores the backup.
    async fn apply(
        &self,
        workshop_id: &str,
        install_dir: &Path,
        record: &BackupRecord,
    ) -> CoreResult<()> {
        let staging = self.settings.staging_dir(workshop_id);
        reset_dir(&staging)
            .await
            .map_err(|e| CoreError::apply(workshop_id, format!("preparing staging failed: {e}")))?;

        let downloaded = timeout(
            self.settings.download_timeout,
            self.workshop.download(workshop_id, &staging),
        )
        .await;

        let download_error = match downloaded {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("download failed: {e}")),
            Err(_) => Some(format!(
                "download timed out after {}s",
                self.settings.download_timeout.as_secs()
            )),
        };
        if let Some(message) = download_error {
            discard(&staging).await;
            return Err(CoreError::apply(workshop_id, message));
        }

        if let Err(e) = swap_in(&staging, install_dir).await {
            discard(&staging).await;
            self.backups.restore(workshop_id, record, install_dir).await?;
            return Err(CoreError::apply(
                workshop_id,
                format!("installing payload failed: {e}"),
            ));
        }
        Ok(())
    }

    async fn mark_failed(&self, workshop_id: &str, error: &CoreError) {
        let message = error.to_string();
        self.update_entry(workshop_id, |entry| {
            entry.status = ModStatus::Failed;
            entry.last_error = Some(message);
        })
        .await;
    }

    async fn update_entry(&self, workshop_id: &str, change: impl FnOnce(&mut ModEntry)) {
        if let Some(entry) = self.entries.write().await.get_mut(workshop_id) {
            change(entry);
        }
    }
}

fn failed(error: &CoreError) -> ModUpdateOutcome {
    ModUpdateOutcome::Failed {
        kind: error.kind(),
        message: error.to_string(),
    }
}

fn server_failed(error: &CoreError) -> ServerUpdateOutcome {
    ServerUpdateOutcome::Failed {
        kind: error.kind(),
        message: error.to_string(),
    }
}

async fn reset_dir(dir: &Path) -> std::io::Result<()> {
    if tokio::fs::try_exists(dir).await? {
        tokio::fs::remove_dir_all(dir).await?;
    }
    tokio::fs::create_dir_all(dir).await
}

async fn swap_in(staging: &Path, install_dir: &Path) -> std::io::Result<()> {
    if tokio::fs::try_exists(install_dir).await? {
        tokio::fs::remove_dir_all(install_dir).await?;
    }
    if let Some(parent) = install_dir.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::rename(staging, install_dir).await
}

async fn discard(staging: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(staging).await {
        debug!("Could not remove staging {}: {e}", staging.display());
    }
}
