mod coordinator;
mod process_handle;

use crate::{
    Clock, CoreError, ExitOutcome, GameBuild, GameUpdateSource, ModVersion, Notification,
    NotificationSink, ProcessLauncher, ProcessSpec, Result as CoreResult, SupervisorSettings,
    TileProcess, TileSpec, WorkshopSource,
};

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use tokio::sync::Notify;
use tokio::time::Instant;

// =========================================================================
// Clock
// =========================================================================

/// Wall clock that starts at a fixed time and advances with tokio's clock,
/// so paused-time tests control both.
pub(crate) struct AnchoredClock {
    base: NaiveDateTime,
    started: Instant,
}

impl AnchoredClock {
    pub(crate) fn at(base: NaiveDateTime) -> Arc<Self> {
        Arc::new(Self {
            base,
            started: Instant::now(),
        })
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = TimeDelta::from_std(self.started.elapsed()).unwrap();
        self.base + elapsed
    }
}

pub(crate) fn time(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 14)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

// =========================================================================
// Processes
// =========================================================================

#[derive(Default)]
struct FakeProcessState {
    alive: bool,
    exit_code: Option<i32>,
    killed: bool,
}

#[derive(Default)]
struct LauncherState {
    launches: u32,
    fail_launch: bool,
    crash_on_start: Option<i32>,
    ignore_term: bool,
    processes: Vec<Arc<Mutex<FakeProcessState>>>,
}

/// In-memory launcher whose processes live until told otherwise.
#[derive(Clone, Default)]
pub(crate) struct FakeLauncher {
    state: Arc<Mutex<LauncherState>>,
}

impl FakeLauncher {
    pub(crate) fn launches(&self) -> u32 {
        self.state.lock().unwrap().launches
    }

    pub(crate) fn alive_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .processes
            .iter()
            .filter(|p| p.lock().unwrap().alive)
            .count()
    }

    pub(crate) fn set_fail_launch(&self, fail: bool) {
        self.state.lock().unwrap().fail_launch = fail;
    }

    pub(crate) fn set_crash_on_start(&self, exit_code: Option<i32>) {
        self.state.lock().unwrap().crash_on_start = exit_code;
    }

    pub(crate) fn set_ignore_term(&self, ignore: bool) {
        self.state.lock().unwrap().ignore_term = ignore;
    }

    /// Make the most recent process exit on its own.
    pub(crate) fn crash_latest(&self, exit_code: i32) {
        let state = self.state.lock().unwrap();
        let mut process = state.processes.last().unwrap().lock().unwrap();
        process.alive = false;
        process.exit_code = Some(exit_code);
    }

    pub(crate) fn latest_was_killed(&self) -> bool {
        let state = self.state.lock().unwrap();
        let process = state.processes.last().unwrap().lock().unwrap();
        process.killed
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&self, tile_id: &str, _spec: &ProcessSpec) -> CoreResult<Box<dyn TileProcess>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_launch {
            return Err(CoreError::launch(tile_id, "executable missing", None));
        }

        state.launches += 1;
        let process = Arc::new(Mutex::new(FakeProcessState {
            alive: state.crash_on_start.is_none(),
            exit_code: state.crash_on_start,
            killed: false,
        }));
        state.processes.push(process.clone());

        Ok(Box::new(FakeProcess {
            pid: 1000 + state.launches,
            ignore_term: state.ignore_term,
            state: process,
        }))
    }
}

struct FakeProcess {
    pid: u32,
    ignore_term: bool,
    state: Arc<Mutex<FakeProcessState>>,
}

#[async_trait]
impl TileProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn is_alive(&mut self) -> bool {
        self.state.lock().unwrap().alive
    }

    fn exit_code(&self) -> Option<i32> {
        self.state.lock().unwrap().exit_code
    }

    fn terminate(&mut self, graceful: bool) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.alive {
            return Ok(());
        }
        if graceful && self.ignore_term {
            return Ok(());
        }

        state.alive = false;
        if graceful {
            state.exit_code = Some(0);
        } else {
            state.exit_code = None;
            state.killed = true;
        }
        Ok(())
    }

    async fn wait_exit(&mut self, grace: Duration) -> CoreResult<ExitOutcome> {
        if self.is_alive() {
            tokio::time::sleep(grace).await;
        }
        if self.is_alive() {
            self.terminate(false)?;
            return Ok(ExitOutcome {
                code: None,
                forced: true,
            });
        }
        Ok(ExitOutcome {
            code: self.exit_code(),
            forced: false,
        })
    }
}

pub(crate) fn tile_spec(id: &str) -> TileSpec {
    TileSpec::new(id, ProcessSpec::new("LastOasisServer", "."))
}

/// Short timings so real-time tests stay fast.
pub(crate) fn fast_settings() -> SupervisorSettings {
    SupervisorSettings {
        poll_interval: Duration::from_millis(10),
        startup_grace: Duration::from_millis(20),
        shutdown_grace: Duration::from_millis(200),
        max_auto_restarts: 3,
        crash_reset_after: Duration::from_secs(60),
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(40),
    }
}

// =========================================================================
// Workshop
// =========================================================================

#[derive(Default)]
struct WorkshopState {
    versions: HashMap<String, u64>,
    failing_checks: HashSet<String>,
    failing_downloads: HashSet<String>,
    downloads: Vec<String>,
    alive_during_download: Vec<usize>,
}

/// Workshop double that writes `payload.txt` containing the version.
#[derive(Clone, Default)]
pub(crate) struct FakeWorkshop {
    state: Arc<Mutex<WorkshopState>>,
    launcher: Option<FakeLauncher>,
    gate: Option<Arc<Notify>>,
}

impl FakeWorkshop {
    /// Records how many fake processes are alive whenever a download starts.
    pub(crate) fn observing(launcher: &FakeLauncher) -> Self {
        Self {
            launcher: Some(launcher.clone()),
            ..Self::default()
        }
    }

    /// Downloads block until the gate is notified.
    pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn publish(&self, workshop_id: &str, version: u64) {
        self.state
            .lock()
            .unwrap()
            .versions
            .insert(workshop_id.to_string(), version);
    }

    pub(crate) fn fail_check(&self, workshop_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_checks
            .insert(workshop_id.to_string());
    }

    pub(crate) fn fail_download(&self, workshop_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_downloads
            .insert(workshop_id.to_string());
    }

    pub(crate) fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.failing_checks.clear();
        state.failing_downloads.clear();
    }

    pub(crate) fn downloads(&self) -> Vec<String> {
        self.state.lock().unwrap().downloads.clone()
    }

    pub(crate) fn alive_during_download(&self) -> Vec<usize> {
        self.state.lock().unwrap().alive_during_download.clone()
    }
}

#[async_trait]
impl WorkshopSource for FakeWorkshop {
    async fn check_version(&self, workshop_id: &str) -> CoreResult<ModVersion> {
        let state = self.state.lock().unwrap();
        if state.failing_checks.contains(workshop_id) {
            return Err(CoreError::update_check(workshop_id, "service unavailable"));
        }
        state
            .versions
            .get(workshop_id)
            .map(|v| ModVersion(*v))
            .ok_or_else(|| CoreError::update_check(workshop_id, "no such item"))
    }

    async fn download(&self, workshop_id: &str, dest: &Path) -> CoreResult<()> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let version = {
            let mut state = self.state.lock().unwrap();
            state.downloads.push(workshop_id.to_string());
            let alive = self.launcher.as_ref().map_or(0, FakeLauncher::alive_count);
            state.alive_during_download.push(alive);

            if state.failing_downloads.contains(workshop_id) {
                return Err(CoreError::apply(workshop_id, "steamcmd exited with 5"));
            }
            state.versions.get(workshop_id).copied().unwrap_or_default()
        };

        std::fs::write(dest.join("payload.txt"), format!("version {version}"))?;
        Ok(())
    }
}

// =========================================================================
// Game server
// =========================================================================

#[derive(Default)]
struct GameServerState {
    installed: Option<u64>,
    latest: u64,
    fail_check: bool,
    fail_update: bool,
    updates: u32,
    alive_during_update: Vec<usize>,
}

/// Server install double; a successful update moves installed to latest.
#[derive(Clone, Default)]
pub(crate) struct FakeGameServer {
    state: Arc<Mutex<GameServerState>>,
    launcher: Option<FakeLauncher>,
}

impl FakeGameServer {
    pub(crate) fn observing(launcher: &FakeLauncher) -> Self {
        Self {
            launcher: Some(launcher.clone()),
            ..Self::default()
        }
    }

    pub(crate) fn set_builds(&self, installed: Option<u64>, latest: u64) {
        let mut state = self.state.lock().unwrap();
        state.installed = installed;
        state.latest = latest;
    }

    pub(crate) fn fail_check(&self) {
        self.state.lock().unwrap().fail_check = true;
    }

    pub(crate) fn fail_update(&self) {
        self.state.lock().unwrap().fail_update = true;
    }

    pub(crate) fn updates(&self) -> u32 {
        self.state.lock().unwrap().updates
    }

    pub(crate) fn alive_during_update(&self) -> Vec<usize> {
        self.state.lock().unwrap().alive_during_update.clone()
    }
}

#[async_trait]
impl GameUpdateSource for FakeGameServer {
    async fn check_build(&self) -> CoreResult<GameBuild> {
        let state = self.state.lock().unwrap();
        if state.fail_check {
            return Err(CoreError::server_check("steamcmd exited with 5"));
        }
        Ok(GameBuild {
            installed: state.installed,
            latest: state.latest,
        })
    }

    async fn update(&self) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        state.updates += 1;
        let alive = self.launcher.as_ref().map_or(0, FakeLauncher::alive_count);
        state.alive_during_update.push(alive);

        if state.fail_update {
            return Err(CoreError::server_update("steamcmd exited with 8"));
        }
        state.installed = Some(state.latest);
        Ok(())
    }
}

// =========================================================================
// Notifications
// =========================================================================

#[derive(Clone, Default)]
pub(crate) struct RecordingSink {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSink {
    pub(crate) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, notification: &Notification) -> CoreResult<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Poll `condition` every few milliseconds until it holds or a second passes.
pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
