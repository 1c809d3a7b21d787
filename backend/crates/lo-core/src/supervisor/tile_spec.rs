use crate::ProcessSpec;

use serde::Serialize;

/// Static description of one tile, derived from configuration at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileSpec {
    pub id: String,
    pub process: ProcessSpec,
}

impl TileSpec {
    pub fn new(id: impl Into<String>, process: ProcessSpec) -> Self {
        Self {
            id: id.into(),
            process,
        }
    }
}
