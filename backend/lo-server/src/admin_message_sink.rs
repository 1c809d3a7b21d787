use lo_core::{CoreError, Notification, NotificationSink, Result as CoreResult};

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};

const SINK_NAME: &str = "admin-message";
const GAME_MODE_SECTION: &str = "[/Game/LastOasis/GameMode/BP_GameMode.BP_GameMode_C]";

/// Shows player-facing notifications in game by writing an `AdminMessage`
/// into each tile's `Game.ini`, then clears it again.
pub struct AdminMessageSink {
    /// Tile id to its `Game.ini`.
    targets: BTreeMap<String, PathBuf>,
    clear_after: Duration,
    /// Bumped on every write so a stale clear never wipes a newer message.
    generations: Arc<Mutex<HashMap<String, u64>>>,
}

impl AdminMessageSink {
    pub fn new(targets: BTreeMap<String, PathBuf>, clear_after: Duration) -> Self {
        Self {
            targets,
            clear_after,
            generations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// `Game.ini` contents carrying `message`; empty clears it.
    pub fn render(message: &str) -> String {
        let message: String = message
            .chars()
            .map(|c| match c {
                '"' => '\'',
                '\r' | '\n' => ' ',
                c => c,
            })
            .collect();
        format!("{GAME_MODE_SECTION}\nAdminMessage=\"{message}\"\n")
    }

    fn bump(&self, tile_id: &str) -> u64 {
        let mut generations = self
            .generations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let generation = generations.entry(tile_id.to_string()).or_default();
        *generation += 1;
        *generation
    }

    fn schedule_clear(&self, tile_id: String, path: PathBuf, generation: u64) {
        let generations = self.generations.clone();
        let clear_after = self.clear_after;

        tokio::spawn(async move {
            tokio::time::sleep(clear_after).await;

            let current = generations
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .get(&tile_id)
                .copied();
            if current != Some(generation) {
                return;
            }

            match write_atomically(&path, &Self::render("")).await {
                Ok(()) => debug!("Cleared admin message on tile {tile_id}"),
                Err(e) => warn!("Clearing admin message on tile {tile_id} failed: {e}"),
            }
        });
    }
}

#[async_trait]
impl NotificationSink for AdminMessageSink {
    fn name(&self) -> &str {
        SINK_NAME
    }

    async fn send(&self, notification: &Notification) -> CoreResult<()> {
        if !notification.kind.is_player_facing() {
            return Ok(());
        }

        let targets: Vec<(&String, &PathBuf)> = match &notification.tile_id {
            Some(tile_id) => self.targets.get_key_value(tile_id).into_iter().collect(),
            None => self.targets.iter().collect(),
        };

        let contents = Self::render(&notification.message);
        let mut failed = Vec::new();
        for (tile_id, path) in targets {
            let generation = self.bump(tile_id);
            match write_atomically(path, &contents).await {
                Ok(()) => self.schedule_clear(tile_id.clone(), path.clone(), generation),
                Err(e) => failed.push(format!("{tile_id}: {e}")),
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(CoreError::notify(SINK_NAME, failed.join("; ")))
        }
    }
}

/// Write through a sibling temp file so the game never reads a partial file.
async fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let temp = path.with_extension("ini.tmp");
    tokio::fs::write(&temp, contents).await?;
    tokio::fs::rename(&temp, path).await
}
