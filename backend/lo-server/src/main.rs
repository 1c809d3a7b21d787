use lo_server::{
    Cli, ModsLedger, SteamGameServer, SteamWorkshop, build_fleet_config, logger, notification_sink,
};

use lo_config::Config;
use lo_core::{FleetController, GameUpdateSource, OsProcessLauncher, SystemClock};

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};
use tokio::time::MissedTickBehavior;

/// How often installed mod versions are compared against the state file.
const LEDGER_SAVE_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => Config::config_dir()?,
    };
    let config = Config::load_from(&config_dir)?;
    config.validate()?;

    let log_file_path: Option<PathBuf> = if let Some(ref filename) = config.logging.file {
        let log_dir = config.log_dir(&config_dir);
        std::fs::create_dir_all(&log_dir)?;
        Some(log_dir.join(filename))
    } else {
        None
    };

    // Initialize logger (before any other logging)
    logger::initialize(config.logging.level, log_file_path, config.logging.colored)?;

    info!("Starting lo-manager v{}", env!("CARGO_PKG_VERSION"));
    config.log_summary();

    if cli.check_config {
        info!("Configuration in {} is valid", config_dir.display());
        return Ok(());
    }

    let mut ledger = ModsLedger::load(config.state_file(&config_dir))?;
    let fleet_config = build_fleet_config(&config, &config_dir, &ledger, !cli.no_autostart)?;

    let workshop = SteamWorkshop::new(&config.mods.steamcmd_path, config.mods.app_id)?
        .with_request_delay(Duration::from_millis(config.mods.request_delay_ms));
    let game: Option<Arc<dyn GameUpdateSource>> = if config.mods.server_updates_enabled() {
        Some(Arc::new(SteamGameServer::new(
            &config.mods.steamcmd_path,
            config.mods.server_app_id,
            &config.server.folder_path,
        )))
    } else {
        info!("Game server update checks are off");
        None
    };
    let sink = notification_sink(&config)?;

    let controller = FleetController::start(
        fleet_config,
        Arc::new(OsProcessLauncher),
        Arc::new(workshop),
        game,
        Arc::new(sink),
        Arc::new(SystemClock),
    )
    .await?;

    let mut save_ticker = tokio::time::interval(LEDGER_SAVE_INTERVAL);
    save_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown_signal = wait_for_shutdown_signal();
    tokio::pin!(shutdown_signal);

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => break,
            _ = save_ticker.tick() => save_ledger(&controller, &mut ledger).await,
        }
    }

    save_ledger(&controller, &mut ledger).await;
    controller.shutdown().await;

    info!("lo-manager stopped");
    Ok(())
}

async fn save_ledger(controller: &FleetController, ledger: &mut ModsLedger) {
    let snapshot = controller.snapshot().await;
    if ledger.record(&snapshot.mods)
        && let Err(e) = ledger.save()
    {
        warn!("Failed to save mod state: {e}");
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to listen for SIGTERM: {e}");
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = terminate.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    }
}
