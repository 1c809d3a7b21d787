use crate::{CommandAck, CoreError, Result as CoreResult, TileCommand, TileHandle, TileSnapshot};

use std::collections::BTreeMap;
use std::sync::Arc;

/// Read-only directory of tile handles, shared by the controller and the
/// mod coordinator. Tiles are fixed for the life of the engine.
#[derive(Clone, Default)]
pub struct TileRouter {
    tiles: Arc<BTreeMap<String, TileHandle>>,
}

impl TileRouter {
    pub fn new(handles: impl IntoIterator<Item = TileHandle>) -> Self {
        let tiles = handles
            .into_iter()
            .map(|handle| (handle.id().to_string(), handle))
            .collect();
        Self {
            tiles: Arc::new(tiles),
        }
    }

    pub fn get(&self, tile_id: &str) -> CoreResult<&TileHandle> {
        self.tiles
            .get(tile_id)
            .ok_or_else(|| CoreError::unknown_tile(tile_id))
    }

    pub fn contains(&self, tile_id: &str) -> bool {
        self.tiles.contains_key(tile_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tiles.keys().map(String::as_str)
    }

    pub fn handles(&self) -> impl Iterator<Item = &TileHandle> {
        self.tiles.values()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub async fn send(&self, tile_id: &str, command: TileCommand) -> CoreResult<CommandAck> {
        self.get(tile_id)?.send(command).await
    }

    pub fn snapshots(&self) -> Vec<TileSnapshot> {
        self.tiles.values().map(TileHandle::snapshot).collect()
    }
}
