//! Turns engine events into tile commands and notifications.

use crate::{
    Clock, CommandOrigin, ErrorKind, FleetEvent, ModUpdateOutcome, Notification,
    NotificationKind, ServerUpdateOutcome, TileCommand, TileRouter, TileStatus, UpdateTarget,
};

use std::sync::Arc;

use chrono::NaiveDateTime;
use futures::future::join_all;
use log::{debug, warn};
use tokio::sync::mpsc;

/// Runs until every event sender is gone.
pub(crate) async fn route_events(
    mut events: mpsc::UnboundedReceiver<FleetEvent>,
    tiles: TileRouter,
    notifications: mpsc::UnboundedSender<Notification>,
    clock: Arc<dyn Clock>,
) {
    while let Some(event) = events.recv().await {
        match &event {
            FleetEvent::Countdown { restart_at, .. } => {
                post_all(
                    &tiles,
                    TileCommand::SchedulePending {
                        at: Some(*restart_at),
                    },
                )
                .await;
            }
            FleetEvent::RestartDue { .. } => {
                post_all(
                    &tiles,
                    TileCommand::Restart {
                        origin: CommandOrigin::Scheduled,
                    },
                )
                .await;
            }
            _ => {}
        }

        for notification in notifications_for(&event, clock.now()) {
            let _ = notifications.send(notification);
        }
    }

    debug!("Event router stopped");
}

/// Enqueue on every tile at once. A tile whose queue is full holds up the
/// router until it has room, but never delays delivery to the other tiles.
async fn post_all(tiles: &TileRouter, command: TileCommand) {
    let posts = tiles.handles().map(|handle| {
        let command = command.clone();
        async move { (handle.id(), handle.post(command).await) }
    });

    for (tile_id, result) in join_all(posts).await {
        if let Err(e) = result {
            warn!("Could not deliver {} to tile {tile_id}: {e}", command.name());
        }
    }
}

fn label(tile_id: &str, display_name: &str) -> String {
    if display_name == tile_id {
        tile_id.to_string()
    } else {
        format!("{display_name} ({tile_id})")
    }
}

pub(crate) fn notifications_for(event: &FleetEvent, now: NaiveDateTime) -> Vec<Notification> {
    match event {
        FleetEvent::TileStatusChanged {
            tile_id,
            display_name,
            to,
            ..
        } => match to {
            // Crashes and launches report through their own events.
            TileStatus::Starting | TileStatus::Crashed => Vec::new(),
            _ => vec![
                Notification::new(
                    NotificationKind::TileStatus,
                    format!("{} is now {to}", label(tile_id, display_name)),
                    now,
                )
                .for_tile(tile_id),
            ],
        },
        FleetEvent::TileCrashed {
            tile_id,
            display_name,
            exit_code,
            consecutive_crashes,
            will_restart,
        } => {
            let code = exit_code.map_or_else(|| "unknown".to_string(), |c| c.to_string());
            let message = if *will_restart {
                format!(
                    "{} crashed (exit code {code}), restarting automatically (crash {consecutive_crashes})",
                    label(tile_id, display_name)
                )
            } else {
                format!(
                    "{} crashed {consecutive_crashes} times in a row and will stay down until started manually",
                    label(tile_id, display_name)
                )
            };
            vec![Notification::new(NotificationKind::TileCrashed, message, now).for_tile(tile_id)]
        }
        FleetEvent::LaunchFailed {
            tile_id,
            display_name,
            message,
        } => vec![
            Notification::new(
                NotificationKind::LaunchFailed,
                format!("{} failed to start: {message}", label(tile_id, display_name)),
                now,
            )
            .for_tile(tile_id)
            .with_error(ErrorKind::Launch),
        ],
        FleetEvent::Countdown {
            minutes_remaining, ..
        } => {
            let unit = if *minutes_remaining == 1 { "minute" } else { "minutes" };
            vec![Notification::new(
                NotificationKind::Countdown,
                format!("Server restart in {minutes_remaining} {unit}"),
                now,
            )]
        }
        FleetEvent::RestartDue { restart_at } => vec![Notification::new(
            NotificationKind::RestartDue,
            format!("Scheduled restart for {} is starting", restart_at.format("%H:%M")),
            now,
        )],
        FleetEvent::ModUpdateAvailable {
            workshop_id,
            installed,
            latest,
        } => {
            let from = installed.map_or_else(|| "not installed".to_string(), |v| v.to_string());
            vec![
                Notification::new(
                    NotificationKind::ModUpdateAvailable,
                    format!("Mod {workshop_id} has an update: {from} -> {latest}"),
                    now,
                )
                .for_mod(workshop_id),
            ]
        }
        FleetEvent::ModUpdateCheckFailed {
            workshop_id,
            message,
        } => vec![
            Notification::new(
                NotificationKind::ModUpdateFailed,
                format!("Checking mod {workshop_id} for updates failed: {message}"),
                now,
            )
            .for_mod(workshop_id)
            .with_error(ErrorKind::UpdateCheck),
        ],
        FleetEvent::ModUpdateFinished { results } => {
            let updated = results.iter().filter(|r| r.is_success()).count();
            let mut notifications = vec![Notification::new(
                NotificationKind::ModUpdateFinished,
                format!(
                    "Mod update finished: {updated} updated, {} failed",
                    results.len() - updated
                ),
                now,
            )];

            notifications.extend(results.iter().filter_map(|result| match &result.outcome {
                ModUpdateOutcome::Failed { kind, message } => Some(
                    Notification::new(
                        NotificationKind::ModUpdateFailed,
                        format!("Mod {} was not updated: {message}", result.workshop_id),
                        now,
                    )
                    .for_mod(&result.workshop_id)
                    .with_error(*kind),
                ),
                ModUpdateOutcome::Updated { .. } => None,
            }));
            notifications
        }
        FleetEvent::UpdateWarning {
            target,
            tile_ids,
            seconds,
        } => {
            let message = match target {
                UpdateTarget::Mods => format!("Mod update restart in {seconds} seconds"),
                UpdateTarget::Server => format!("Server update restart in {seconds} seconds"),
            };
            let notification = Notification::new(NotificationKind::UpdateWarning, message, now);
            match tile_ids {
                None => vec![notification],
                Some(tile_ids) => tile_ids
                    .iter()
                    .map(|tile_id| notification.clone().for_tile(tile_id))
                    .collect(),
            }
        }
        FleetEvent::ServerUpdateAvailable { installed, latest } => {
            let from = installed.map_or_else(|| "unknown".to_string(), |b| b.to_string());
            vec![Notification::new(
                NotificationKind::ServerUpdate,
                format!("Game server update available: build {from} -> {latest}"),
                now,
            )]
        }
        FleetEvent::ServerUpdateCheckFailed { message } => vec![
            Notification::new(
                NotificationKind::ServerUpdate,
                format!("Checking the game server build failed: {message}"),
                now,
            )
            .with_error(ErrorKind::UpdateCheck),
        ],
        FleetEvent::ServerUpdateFinished { outcome } => match outcome {
            ServerUpdateOutcome::UpToDate { .. } | ServerUpdateOutcome::Postponed { .. } => {
                Vec::new()
            }
            ServerUpdateOutcome::Updated { build } => vec![Notification::new(
                NotificationKind::ServerUpdate,
                format!("Game server updated to build {build}"),
                now,
            )],
            ServerUpdateOutcome::Failed { kind, message } => vec![
                Notification::new(
                    NotificationKind::ServerUpdate,
                    format!("Game server was not updated: {message}"),
                    now,
                )
                .with_error(*kind),
            ],
        },
    }
}
