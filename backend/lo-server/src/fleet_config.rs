//! Maps loaded configuration onto the values the engine runs with.

use crate::{ModsLedger, Result as ServerErrorResult};

use lo_config::{Config, ServerConfig};
use lo_core::{
    FleetConfig, ModRegistration, ModSettings, NameScanSettings, ProcessSpec, RestartSchedule,
    SupervisorSettings, TileSpec,
};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command line for tile `index`.
pub fn tile_process(server: &ServerConfig, mods_arg: Option<&str>, index: u32) -> ProcessSpec {
    let offset = index as u16;
    let mut spec = ProcessSpec::new(server.executable_path(), server.working_dir()).args([
        format!("-identifier={}", server.tile_id(index)),
        format!("-port={}", server.start_port + offset),
        format!("-QueryPort={}", server.start_query_port + offset),
        "-log".to_string(),
        "-messaging".to_string(),
        "-noupnp".to_string(),
        "-NoLiveServer".to_string(),
        format!("-backendapiurloverride={}", server.backend),
        format!("-CustomerKey={}", server.customer_key),
        format!("-ProviderKey={}", server.provider_key),
        format!("-slots={}", server.slots),
        format!("-OverrideConnectionAddress={}", server.connection_ip),
    ]);

    if let Some(mods) = mods_arg {
        spec = spec.arg(format!("-mods={mods}"));
    }
    spec.args(server.extra_args.iter().cloned())
}

pub fn supervisor_settings(config: &Config) -> SupervisorSettings {
    let supervisor = &config.supervisor;
    SupervisorSettings {
        poll_interval: Duration::from_millis(supervisor.poll_interval_ms),
        startup_grace: Duration::from_secs(supervisor.startup_grace_secs),
        shutdown_grace: Duration::from_secs(supervisor.shutdown_grace_secs),
        max_auto_restarts: supervisor.max_auto_restarts,
        crash_reset_after: Duration::from_secs(supervisor.crash_reset_secs),
        initial_backoff: Duration::from_millis(supervisor.initial_backoff_ms),
        max_backoff: Duration::from_millis(supervisor.max_backoff_ms),
    }
}

pub fn mod_settings(config: &Config, config_dir: &Path) -> ModSettings {
    let defaults = ModSettings::new(config.mods_dir(), config.backup_dir(config_dir));
    // Zero means no server checks; the interval is then never armed.
    let server_check_interval = match config.mods.server_check_interval_secs {
        0 => defaults.server_check_interval,
        secs => Duration::from_secs(secs),
    };

    ModSettings {
        check_interval: Duration::from_secs(config.mods.check_interval_secs),
        quiesce_timeout: Duration::from_secs(config.mods.quiesce_timeout_secs),
        download_timeout: Duration::from_secs(config.mods.download_timeout_secs),
        backup_retention: config.mods.backup_retention,
        update_warning: Duration::from_secs(config.mods.update_warning_secs),
        server_check_interval,
        ..defaults
    }
}

/// Each tile's `Game.ini`, for in-game admin messages.
pub fn admin_message_targets(server: &ServerConfig) -> BTreeMap<String, PathBuf> {
    server
        .tile_ids()
        .into_iter()
        .map(|tile_id| {
            let path = server.admin_config_path(&tile_id);
            (tile_id, path)
        })
        .collect()
}

/// Build the engine configuration. Registered mods start from the versions
/// recorded in `ledger`; a mod missing there is installed on the first cycle.
pub fn build_fleet_config(
    config: &Config,
    config_dir: &Path,
    ledger: &ModsLedger,
    autostart: bool,
) -> ServerErrorResult<FleetConfig> {
    let mods_arg = config.mods.mods_arg();
    let tiles = (0..config.server.tile_count)
        .map(|index| {
            TileSpec::new(
                config.server.tile_id(index),
                tile_process(&config.server, mods_arg.as_deref(), index),
            )
        })
        .collect();

    let schedule = if config.schedule.enabled {
        Some(RestartSchedule::new(
            config.schedule.restart_hours.iter().copied(),
            config.schedule.notify_minutes.iter().copied(),
        )?)
    } else {
        None
    };

    let registered_mods = config
        .mods
        .workshop_ids
        .iter()
        .map(|workshop_id| ModRegistration {
            workshop_id: workshop_id.clone(),
            tiles: Vec::new(),
            installed: ledger.installed(workshop_id),
        })
        .collect();

    let name_scan = (config.supervisor.name_scan_secs > 0).then(|| NameScanSettings {
        log_dir: config.server.log_dir(),
        interval: Duration::from_secs(config.supervisor.name_scan_secs),
    });

    Ok(FleetConfig {
        tiles,
        supervisor: supervisor_settings(config),
        schedule,
        mods: mod_settings(config, config_dir),
        registered_mods,
        name_scan,
        autostart,
    })
}
