use crate::{ErrorKind, ModVersion};

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ModUpdateOutcome {
    Updated { version: ModVersion },
    /// Prior install left in place (or restored from backup).
    Failed { kind: ErrorKind, message: String },
}

/// Per-mod line of an update cycle summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModUpdateResult {
    pub workshop_id: String,
    #[serde(flatten)]
    pub outcome: ModUpdateOutcome,
}

impl ModUpdateResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ModUpdateOutcome::Updated { .. })
    }
}
