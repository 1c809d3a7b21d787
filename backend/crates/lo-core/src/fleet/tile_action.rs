use serde::Deserialize;

/// Operator command for one tile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", content = "message", rename_all = "snake_case")]
pub enum TileAction {
    Start,
    Stop,
    Restart,
    BroadcastMessage(String),
}
