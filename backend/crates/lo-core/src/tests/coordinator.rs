use crate::tests::{
    AnchoredClock, FakeGameServer, FakeLauncher, FakeWorkshop, eventually, fast_settings,
    tile_spec, time,
};
use crate::{
    CommandOrigin, CoreError, ErrorKind, FleetEvent, GameBuild, ModSettings, ModStatus,
    ModUpdateCoordinator, ModUpdateOutcome, ModVersion, ServerUpdateOutcome, ShutdownCoordinator,
    TileCommand, TileRouter, TileStatus, TileSupervisor, UpdateTarget,
};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use googletest::assert_that;
use googletest::prelude::{anything, eq, ge, none, some};
use tempfile::TempDir;
use tokio::sync::{Notify, mpsc};
use tokio::time::Instant;

const MOD_ID: &str = "2815034671";

struct Harness {
    _temp: TempDir,
    settings: ModSettings,
    launcher: FakeLauncher,
    workshop: FakeWorkshop,
    game: FakeGameServer,
    tiles: TileRouter,
    coordinator: ModUpdateCoordinator,
    events: mpsc::UnboundedReceiver<FleetEvent>,
}

fn harness_with(workshop: impl FnOnce(&FakeLauncher) -> FakeWorkshop) -> Harness {
    let temp = TempDir::new().unwrap();
    let mut settings = ModSettings::new(temp.path().join("mods"), temp.path().join("backups"));
    settings.quiesce_timeout = Duration::from_secs(5);
    settings.download_timeout = Duration::from_secs(5);
    harness_in(temp, settings, workshop)
}

fn harness_in(
    temp: TempDir,
    settings: ModSettings,
    workshop: impl FnOnce(&FakeLauncher) -> FakeWorkshop,
) -> Harness {
    let launcher = FakeLauncher::default();
    let workshop = workshop(&launcher);
    let game = FakeGameServer::observing(&launcher);
    let (events_tx, events) = mpsc::unbounded_channel();

    let handles = ["Disc0oasis1", "Disc0oasis2"].map(|id| {
        TileSupervisor::spawn(
            tile_spec(id),
            fast_settings(),
            Arc::new(launcher.clone()),
            AnchoredClock::at(time(10, 0)),
            events_tx.clone(),
        )
        .0
    });
    let tiles = TileRouter::new(handles);

    let coordinator = ModUpdateCoordinator::new(
        settings.clone(),
        Arc::new(workshop.clone()),
        tiles.clone(),
        events_tx,
    )
    .with_game_updates(Arc::new(game.clone()));

    Harness {
        _temp: temp,
        settings,
        launcher,
        workshop,
        game,
        tiles,
        coordinator,
        events,
    }
}

fn install(settings: &ModSettings, workshop_id: &str, contents: &str) {
    let dir = settings.install_dir(workshop_id);
    std::fs::create_dir_all(dir.join("Content")).unwrap();
    std::fs::write(dir.join("payload.txt"), contents).unwrap();
    std::fs::write(dir.join("Content").join("data.pak"), [1u8, 2, 3, 4]).unwrap();
}

fn read_tree(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let name = path.strip_prefix(dir).unwrap().display().to_string();
                files.push((name, std::fs::read(&path).unwrap()));
            }
        }
    }
    files.sort();
    files
}

async fn start(h: &Harness, tile_id: &str) {
    h.tiles
        .send(
            tile_id,
            TileCommand::Start {
                origin: CommandOrigin::Manual,
            },
        )
        .await
        .unwrap();
}

// =========================================================================
// Full cycle
// =========================================================================

#[tokio::test]
async fn given_shared_mod_when_update_applied_then_both_tiles_held_updated_and_restarted() {
    // Given
    let h = harness_with(FakeWorkshop::observing);
    install(&h.settings, MOD_ID, "version 100");
    h.coordinator
        .register(MOD_ID, Vec::new(), Some(ModVersion(100)))
        .await
        .unwrap();
    h.workshop.publish(MOD_ID, 200);
    start(&h, "Disc0oasis1").await;
    let launches_before = h.launcher.launches();

    // When
    let results = h.coordinator.run_cycle().await.unwrap();

    // Then
    assert_that!(results.len(), eq(1));
    assert_that!(
        results[0].outcome,
        eq(&ModUpdateOutcome::Updated {
            version: ModVersion(200)
        })
    );

    // The download only ran once nothing was alive.
    assert_that!(h.workshop.alive_during_download(), eq(&vec![0]));

    let entry = h.coordinator.entry(MOD_ID).await.unwrap();
    assert_that!(entry.status, eq(ModStatus::UpToDate));
    assert_that!(entry.installed_version, some(eq(ModVersion(200))));
    assert_that!(entry.latest_known_version, some(eq(ModVersion(200))));
    assert_that!(entry.backup_path, some(anything()));

    let installed = std::fs::read_to_string(h.settings.install_dir(MOD_ID).join("payload.txt"));
    assert_that!(installed.unwrap(), eq("version 200"));
    let backup = entry.backup_path.unwrap();
    assert_that!(
        std::fs::read_to_string(backup.join("payload.txt")).unwrap(),
        eq("version 100")
    );

    // Both tiles, including the one that was stopped, restart together.
    assert_that!(h.launcher.launches(), eq(launches_before + 2));
    for snapshot in h.tiles.snapshots() {
        assert_that!(snapshot.update_hold, eq(false));
        assert!(snapshot.status.has_process());
    }
    assert!(!h.coordinator.is_cycle_running());
}

#[tokio::test]
async fn given_never_installed_mod_when_cycle_runs_then_initial_install_happens() {
    // Given
    let mut h = harness_with(|_| FakeWorkshop::default());
    h.coordinator.register(MOD_ID, Vec::new(), None).await.unwrap();
    h.workshop.publish(MOD_ID, 7);

    // When
    let results = h.coordinator.run_cycle().await.unwrap();

    // Then
    assert!(results[0].is_success());
    assert!(h.settings.install_dir(MOD_ID).join("payload.txt").exists());

    let mut finished = false;
    while let Ok(event) = h.events.try_recv() {
        if let FleetEvent::ModUpdateFinished { results } = event {
            finished = results.len() == 1 && results[0].is_success();
        }
    }
    assert!(finished);
}

#[tokio::test]
async fn given_up_to_date_mod_when_cycle_runs_then_nothing_is_held() {
    // Given
    let h = harness_with(|_| FakeWorkshop::default());
    h.coordinator
        .register(MOD_ID, Vec::new(), Some(ModVersion(5)))
        .await
        .unwrap();
    h.workshop.publish(MOD_ID, 5);
    start(&h, "Disc0oasis1").await;

    // When
    let results = h.coordinator.run_cycle().await.unwrap();

    // Then
    assert!(results.is_empty());
    assert!(h.workshop.downloads().is_empty());
    assert_that!(h.launcher.launches(), eq(1));
    let entry = h.coordinator.entry(MOD_ID).await.unwrap();
    assert_that!(entry.status, eq(ModStatus::UpToDate));
}

#[tokio::test]
async fn given_mod_for_one_tile_when_updated_then_other_tile_untouched() {
    // Given
    let h = harness_with(|_| FakeWorkshop::default());
    h.coordinator
        .register(MOD_ID, vec!["Disc0oasis2".into()], Some(ModVersion(1)))
        .await
        .unwrap();
    h.workshop.publish(MOD_ID, 2);
    start(&h, "Disc0oasis1").await;
    let pid_before = h.tiles.get("Disc0oasis1").unwrap().snapshot().pid;

    // When
    h.coordinator.run_cycle().await.unwrap();

    // Then
    let untouched = h.tiles.get("Disc0oasis1").unwrap().snapshot();
    assert_that!(untouched.pid, eq(pid_before));
    assert_that!(untouched.update_hold, eq(false));
}

// =========================================================================
// Failures
// =========================================================================

#[tokio::test]
async fn given_backup_store_unwritable_when_cycle_runs_then_failed_and_install_byte_identical() {
    // Given
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("backups");
    std::fs::write(&blocker, "not a directory").unwrap();
    let settings = ModSettings::new(temp.path().join("mods"), &blocker);
    let h = harness_in(temp, settings, |_| FakeWorkshop::default());

    install(&h.settings, MOD_ID, "version 1");
    let before = read_tree(&h.settings.install_dir(MOD_ID));
    h.coordinator
        .register(MOD_ID, Vec::new(), Some(ModVersion(1)))
        .await
        .unwrap();
    h.workshop.publish(MOD_ID, 2);
    start(&h, "Disc0oasis1").await;

    // When
    let results = h.coordinator.run_cycle().await.unwrap();

    // Then
    match &results[0].outcome {
        ModUpdateOutcome::Failed { kind, .. } => assert_that!(*kind, eq(ErrorKind::Backup)),
        other => panic!("expected failure, got {other:?}"),
    }
    let entry = h.coordinator.entry(MOD_ID).await.unwrap();
    assert_that!(entry.status, eq(ModStatus::Failed));
    assert_that!(entry.installed_version, some(eq(ModVersion(1))));
    assert_that!(entry.last_error, some(anything()));
    assert!(h.workshop.downloads().is_empty());
    assert_that!(read_tree(&h.settings.install_dir(MOD_ID)), eq(&before));

    // Tiles are released even though the update failed.
    for snapshot in h.tiles.snapshots() {
        assert_that!(snapshot.update_hold, eq(false));
    }
}

#[tokio::test]
async fn given_download_fails_when_cycle_runs_then_rolled_back_with_backup_intact() {
    // Given
    let h = harness_with(|_| FakeWorkshop::default());
    install(&h.settings, MOD_ID, "version 1");
    let before = read_tree(&h.settings.install_dir(MOD_ID));
    h.coordinator
        .register(MOD_ID, Vec::new(), Some(ModVersion(1)))
        .await
        .unwrap();
    h.workshop.publish(MOD_ID, 2);
    h.workshop.fail_download(MOD_ID);

    // When
    let results = h.coordinator.run_cycle().await.unwrap();

    // Then
    assert!(!results[0].is_success());
    let entry = h.coordinator.entry(MOD_ID).await.unwrap();
    assert_that!(entry.status, eq(ModStatus::Failed));
    assert_that!(entry.installed_version, some(eq(ModVersion(1))));
    assert_that!(read_tree(&h.settings.install_dir(MOD_ID)), eq(&before));

    let backup = entry.backup_path.unwrap();
    assert_that!(read_tree(&backup), eq(&before));
    assert!(!h.settings.staging_dir(MOD_ID).exists());
}

#[tokio::test]
async fn given_failed_mod_when_next_cycle_succeeds_then_up_to_date() {
    // Given
    let h = harness_with(|_| FakeWorkshop::default());
    h.coordinator
        .register(MOD_ID, Vec::new(), Some(ModVersion(1)))
        .await
        .unwrap();
    h.workshop.publish(MOD_ID, 2);
    h.workshop.fail_download(MOD_ID);
    h.coordinator.run_cycle().await.unwrap();
    assert_that!(
        h.coordinator.entry(MOD_ID).await.unwrap().status,
        eq(ModStatus::Failed)
    );

    // When
    h.workshop.clear_failures();
    let results = h.coordinator.run_cycle().await.unwrap();

    // Then
    assert!(results[0].is_success());
    let entry = h.coordinator.entry(MOD_ID).await.unwrap();
    assert_that!(entry.status, eq(ModStatus::UpToDate));
    assert_that!(entry.installed_version, some(eq(ModVersion(2))));
    assert_that!(entry.last_error, none());
}

#[tokio::test]
async fn given_workshop_unreachable_when_cycle_runs_then_marked_failed_and_reported() {
    // Given
    let mut h = harness_with(|_| FakeWorkshop::default());
    h.coordinator
        .register(MOD_ID, Vec::new(), Some(ModVersion(3)))
        .await
        .unwrap();
    h.workshop.fail_check(MOD_ID);

    // When
    let results = h.coordinator.run_cycle().await.unwrap();

    // Then
    assert!(results.is_empty());
    let entry = h.coordinator.entry(MOD_ID).await.unwrap();
    assert_that!(entry.status, eq(ModStatus::Failed));
    assert_that!(entry.installed_version, some(eq(ModVersion(3))));
    assert_that!(entry.last_error, some(anything()));
    assert!(matches!(
        h.events.try_recv(),
        Ok(FleetEvent::ModUpdateCheckFailed { .. })
    ));
}

#[tokio::test]
async fn given_check_failed_when_workshop_back_then_up_to_date_again() {
    // Given
    let h = harness_with(|_| FakeWorkshop::default());
    h.coordinator
        .register(MOD_ID, Vec::new(), Some(ModVersion(3)))
        .await
        .unwrap();
    h.workshop.fail_check(MOD_ID);
    h.coordinator.run_cycle().await.unwrap();

    // When
    h.workshop.clear_failures();
    h.workshop.publish(MOD_ID, 3);
    let results = h.coordinator.run_cycle().await.unwrap();

    // Then
    assert!(results.is_empty());
    let entry = h.coordinator.entry(MOD_ID).await.unwrap();
    assert_that!(entry.status, eq(ModStatus::UpToDate));
    assert_that!(entry.last_error, none());
}

#[tokio::test]
async fn given_tile_that_will_not_stop_when_cycle_runs_then_quiesce_timeout_fails_update() {
    // Given
    let temp = TempDir::new().unwrap();
    let mut settings = ModSettings::new(temp.path().join("mods"), temp.path().join("backups"));
    settings.quiesce_timeout = Duration::from_millis(50);
    let h = harness_in(temp, settings, |_| FakeWorkshop::default());
    install(&h.settings, MOD_ID, "version 1");
    h.coordinator
        .register(MOD_ID, Vec::new(), Some(ModVersion(1)))
        .await
        .unwrap();
    h.workshop.publish(MOD_ID, 2);
    h.launcher.set_ignore_term(true);
    start(&h, "Disc0oasis1").await;

    // When
    let results = h.coordinator.run_cycle().await.unwrap();

    // Then
    match &results[0].outcome {
        ModUpdateOutcome::Failed { kind, .. } => assert_that!(*kind, eq(ErrorKind::Apply)),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(h.workshop.downloads().is_empty());
    let entry = h.coordinator.entry(MOD_ID).await.unwrap();
    assert_that!(entry.installed_version, some(eq(ModVersion(1))));
    assert_that!(entry.backup_path, none());
}

// =========================================================================
// Exclusivity and registry
// =========================================================================

#[tokio::test]
async fn given_cycle_in_progress_when_second_cycle_or_removal_then_rejected() {
    // Given
    let gate = Arc::new(Notify::new());
    let gate_for_workshop = gate.clone();
    let h = harness_with(move |_| FakeWorkshop::default().gated(gate_for_workshop));
    h.coordinator
        .register(MOD_ID, Vec::new(), Some(ModVersion(1)))
        .await
        .unwrap();
    h.workshop.publish(MOD_ID, 2);

    let running = h.coordinator.clone();
    let cycle = tokio::spawn(async move { running.run_cycle().await });
    let mut updating = false;
    for _ in 0..200 {
        let entry = h.coordinator.entry(MOD_ID).await;
        if entry.is_some_and(|e| e.status == ModStatus::Updating) {
            updating = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(updating);
    assert!(h.coordinator.is_cycle_running());

    // When
    let second = h.coordinator.run_cycle().await;
    let removal = h.coordinator.remove(MOD_ID).await;

    // Then
    assert!(matches!(second, Err(CoreError::UpdateInProgress { .. })));
    assert!(matches!(removal, Err(CoreError::UpdateInProgress { .. })));

    gate.notify_one();
    let results = cycle.await.unwrap().unwrap();
    assert!(results[0].is_success());
    assert!(h.coordinator.remove(MOD_ID).await.is_ok());
}

#[tokio::test]
async fn given_registered_mod_when_registered_again_then_duplicate_error() {
    let h = harness_with(|_| FakeWorkshop::default());
    h.coordinator.register(MOD_ID, Vec::new(), None).await.unwrap();

    let again = h.coordinator.register(MOD_ID, Vec::new(), None).await;
    let unknown_tile = h
        .coordinator
        .register("42", vec!["Disc0oasis9".into()], None)
        .await;
    let unknown_mod = h.coordinator.remove("42").await;

    assert!(matches!(again, Err(CoreError::DuplicateMod { .. })));
    assert!(matches!(unknown_tile, Err(CoreError::UnknownTile { .. })));
    assert!(matches!(unknown_mod, Err(CoreError::UnknownMod { .. })));
}

#[tokio::test]
async fn given_new_mod_when_registered_then_update_available_until_installed() {
    let h = harness_with(|_| FakeWorkshop::default());

    let fresh = h.coordinator.register(MOD_ID, Vec::new(), None).await.unwrap();
    let known = h
        .coordinator
        .register("99", Vec::new(), Some(ModVersion(4)))
        .await
        .unwrap();

    assert_that!(fresh.status, eq(ModStatus::UpdateAvailable));
    assert_that!(known.status, eq(ModStatus::UpToDate));
}

// =========================================================================
// Crash ceiling and warnings
// =========================================================================

#[tokio::test]
async fn given_tile_past_crash_ceiling_when_update_released_then_stays_crashed() {
    // Given
    let h = harness_with(|_| FakeWorkshop::default());
    h.launcher.set_crash_on_start(Some(1));
    start(&h, "Disc0oasis1").await;
    let crashed = h.tiles.get("Disc0oasis1").unwrap().clone();
    assert!(
        eventually(|| {
            let snapshot = crashed.snapshot();
            snapshot.status == TileStatus::Crashed && snapshot.consecutive_crash_count == 4
        })
        .await
    );
    h.launcher.set_crash_on_start(None);
    let launches_at_ceiling = h.launcher.launches();

    h.coordinator
        .register(MOD_ID, Vec::new(), Some(ModVersion(1)))
        .await
        .unwrap();
    h.workshop.publish(MOD_ID, 2);

    // When
    let results = h.coordinator.run_cycle().await.unwrap();

    // Then
    assert!(results[0].is_success());
    let snapshot = crashed.snapshot();
    assert_that!(snapshot.status, eq(TileStatus::Crashed));
    assert_that!(snapshot.update_hold, eq(false));
    assert_that!(snapshot.pid, none());
    // Only the other tile came back up.
    assert_that!(h.launcher.launches(), eq(launches_at_ceiling + 1));

    start(&h, "Disc0oasis1").await;
    assert!(crashed.snapshot().status.has_process());
}

#[tokio::test]
async fn given_update_warning_when_tiles_running_then_players_warned_before_hold() {
    // Given
    let temp = TempDir::new().unwrap();
    let mut settings = ModSettings::new(temp.path().join("mods"), temp.path().join("backups"));
    settings.update_warning = Duration::from_secs(1);
    let mut h = harness_in(temp, settings, FakeWorkshop::observing);
    h.coordinator
        .register(MOD_ID, Vec::new(), Some(ModVersion(1)))
        .await
        .unwrap();
    h.workshop.publish(MOD_ID, 2);
    start(&h, "Disc0oasis1").await;
    while h.events.try_recv().is_ok() {}

    // When
    let started = Instant::now();
    let results = h.coordinator.run_cycle().await.unwrap();

    // Then
    assert!(results[0].is_success());
    assert_that!(started.elapsed(), ge(Duration::from_secs(1)));

    let mut events = Vec::new();
    while let Ok(event) = h.events.try_recv() {
        events.push(event);
    }
    let warned = events
        .iter()
        .position(|e| matches!(e, FleetEvent::UpdateWarning { .. }))
        .unwrap();
    let held = events
        .iter()
        .position(|e| {
            matches!(
                e,
                FleetEvent::TileStatusChanged {
                    to: TileStatus::Restarting | TileStatus::UpdateBlocked,
                    ..
                }
            )
        })
        .unwrap();
    assert!(warned < held);
    assert_that!(
        events[warned],
        eq(&FleetEvent::UpdateWarning {
            target: UpdateTarget::Mods,
            tile_ids: None,
            seconds: 1,
        })
    );
}

#[tokio::test]
async fn given_update_warning_when_no_tile_running_then_update_starts_at_once() {
    // Given
    let temp = TempDir::new().unwrap();
    let mut settings = ModSettings::new(temp.path().join("mods"), temp.path().join("backups"));
    settings.update_warning = Duration::from_secs(3600);
    let mut h = harness_in(temp, settings, |_| FakeWorkshop::default());
    h.coordinator
        .register(MOD_ID, Vec::new(), Some(ModVersion(1)))
        .await
        .unwrap();
    h.workshop.publish(MOD_ID, 2);

    // When
    let results = tokio::time::timeout(Duration::from_secs(5), h.coordinator.run_cycle())
        .await
        .unwrap()
        .unwrap();

    // Then
    assert!(results[0].is_success());
    while let Ok(event) = h.events.try_recv() {
        assert!(!matches!(event, FleetEvent::UpdateWarning { .. }));
    }
}

#[tokio::test]
async fn given_shutdown_during_update_warning_when_polling_then_nothing_held_or_downloaded() {
    // Given
    let temp = TempDir::new().unwrap();
    let mut settings = ModSettings::new(temp.path().join("mods"), temp.path().join("backups"));
    settings.update_warning = Duration::from_secs(3600);
    let mut h = harness_in(temp, settings, |_| FakeWorkshop::default());
    h.coordinator
        .register(MOD_ID, Vec::new(), Some(ModVersion(1)))
        .await
        .unwrap();
    h.workshop.publish(MOD_ID, 2);
    h.game.set_builds(Some(7), 7);
    start(&h, "Disc0oasis1").await;

    let shutdown = ShutdownCoordinator::new();
    let poller = tokio::spawn(h.coordinator.clone().run(shutdown.subscribe_guard()));
    loop {
        match h.events.recv().await.unwrap() {
            FleetEvent::UpdateWarning { .. } => break,
            _ => continue,
        }
    }

    // When
    shutdown.shutdown();
    let stopped = tokio::time::timeout(Duration::from_secs(2), poller).await;

    // Then
    assert!(stopped.is_ok());
    assert!(h.workshop.downloads().is_empty());
    let snapshot = h.tiles.get("Disc0oasis1").unwrap().snapshot();
    assert_that!(snapshot.update_hold, eq(false));
    assert!(snapshot.status.has_process());
    let entry = h.coordinator.entry(MOD_ID).await.unwrap();
    assert_that!(entry.status, eq(ModStatus::UpdateAvailable));
}

// =========================================================================
// Backups
// =========================================================================

#[tokio::test]
async fn given_retention_prunes_new_backup_when_updated_then_backup_path_still_exists() {
    // Given
    let temp = TempDir::new().unwrap();
    let mut settings = ModSettings::new(temp.path().join("mods"), temp.path().join("backups"));
    settings.backup_retention = 1;
    // Sorts after any backup taken today, so retention keeps it instead.
    let later = settings.backup_dir.join(MOD_ID).join("29991231T000000.000Z");
    std::fs::create_dir_all(&later).unwrap();
    std::fs::write(later.join("payload.txt"), "version 0").unwrap();
    let h = harness_in(temp, settings, |_| FakeWorkshop::default());

    install(&h.settings, MOD_ID, "version 1");
    h.coordinator
        .register(MOD_ID, Vec::new(), Some(ModVersion(1)))
        .await
        .unwrap();
    h.workshop.publish(MOD_ID, 2);

    // When
    let results = h.coordinator.run_cycle().await.unwrap();

    // Then
    assert!(results[0].is_success());
    let entry = h.coordinator.entry(MOD_ID).await.unwrap();
    let backup = entry.backup_path.unwrap();
    assert!(backup.is_dir());
    assert_that!(backup, eq(&later));
}

// =========================================================================
// Game server updates
// =========================================================================

#[tokio::test]
async fn given_server_behind_when_server_cycle_runs_then_all_tiles_held_updated_and_restarted() {
    // Given
    let h = harness_with(|_| FakeWorkshop::default());
    h.game.set_builds(Some(100), 101);
    start(&h, "Disc0oasis1").await;
    start(&h, "Disc0oasis2").await;
    let launches_before = h.launcher.launches();

    // When
    let outcome = h.coordinator.run_server_cycle().await.unwrap();

    // Then
    assert_that!(outcome, eq(&ServerUpdateOutcome::Updated { build: 101 }));
    assert_that!(h.game.updates(), eq(1));
    assert_that!(h.game.alive_during_update(), eq(&vec![0]));
    assert_that!(h.launcher.launches(), eq(launches_before + 2));
    for snapshot in h.tiles.snapshots() {
        assert_that!(snapshot.update_hold, eq(false));
        assert!(snapshot.status.has_process());
    }
    assert_that!(
        h.coordinator.server_build().await,
        some(eq(GameBuild {
            installed: Some(101),
            latest: 101,
        }))
    );
    assert!(!h.coordinator.is_cycle_running());
}

#[tokio::test]
async fn given_server_current_when_server_cycle_runs_then_nothing_held() {
    // Given
    let h = harness_with(|_| FakeWorkshop::default());
    h.game.set_builds(Some(101), 101);
    start(&h, "Disc0oasis1").await;
    let pid_before = h.tiles.get("Disc0oasis1").unwrap().snapshot().pid;

    // When
    let outcome = h.coordinator.run_server_cycle().await.unwrap();

    // Then
    assert_that!(outcome, eq(&ServerUpdateOutcome::UpToDate { build: 101 }));
    assert_that!(h.game.updates(), eq(0));
    assert_that!(
        h.tiles.get("Disc0oasis1").unwrap().snapshot().pid,
        eq(pid_before)
    );
}

#[tokio::test]
async fn given_server_update_fails_when_server_cycle_runs_then_reported_and_tiles_restarted() {
    // Given
    let mut h = harness_with(|_| FakeWorkshop::default());
    h.game.set_builds(Some(100), 101);
    h.game.fail_update();
    start(&h, "Disc0oasis1").await;

    // When
    let outcome = h.coordinator.run_server_cycle().await.unwrap();

    // Then
    match &outcome {
        ServerUpdateOutcome::Failed { kind, .. } => assert_that!(*kind, eq(ErrorKind::Apply)),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(h.tiles.get("Disc0oasis1").unwrap().snapshot().status.has_process());

    let mut finished = None;
    while let Ok(event) = h.events.try_recv() {
        if let FleetEvent::ServerUpdateFinished { outcome } = event {
            finished = Some(outcome);
        }
    }
    assert_that!(finished, some(eq(&outcome)));
}

#[tokio::test]
async fn given_server_check_fails_when_server_cycle_runs_then_error_reported() {
    // Given
    let mut h = harness_with(|_| FakeWorkshop::default());
    h.game.fail_check();

    // When
    let result = h.coordinator.run_server_cycle().await;

    // Then
    assert!(matches!(result, Err(CoreError::ServerCheck { .. })));
    assert!(matches!(
        h.events.try_recv(),
        Ok(FleetEvent::ServerUpdateCheckFailed { .. })
    ));
    assert_that!(h.coordinator.server_build().await, none());
}

#[tokio::test]
async fn given_mod_cycle_running_when_server_cycle_requested_then_rejected() {
    // Given
    let gate = Arc::new(Notify::new());
    let gate_for_workshop = gate.clone();
    let h = harness_with(move |_| FakeWorkshop::default().gated(gate_for_workshop));
    h.coordinator
        .register(MOD_ID, Vec::new(), Some(ModVersion(1)))
        .await
        .unwrap();
    h.workshop.publish(MOD_ID, 2);
    h.game.set_builds(Some(1), 2);

    let running = h.coordinator.clone();
    let cycle = tokio::spawn(async move { running.run_cycle().await });
    let coordinator = h.coordinator.clone();
    assert!(eventually(|| coordinator.is_cycle_running()).await);

    // When
    let server = h.coordinator.run_server_cycle().await;

    // Then
    assert!(matches!(server, Err(CoreError::UpdateInProgress { .. })));
    gate.notify_one();
    cycle.await.unwrap().unwrap();
    assert_that!(h.game.updates(), eq(0));
}

#[tokio::test]
async fn given_no_game_source_when_server_cycle_requested_then_invalid_command() {
    let (events, _rx) = mpsc::unbounded_channel();
    let coordinator = ModUpdateCoordinator::new(
        ModSettings::new("mods", "backups"),
        Arc::new(FakeWorkshop::default()),
        TileRouter::default(),
        events,
    );

    let result = coordinator.run_server_cycle().await;

    assert!(matches!(result, Err(CoreError::InvalidCommand { .. })));
}
