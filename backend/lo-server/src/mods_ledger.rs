use crate::{Result as ServerErrorResult, ServerError};

use lo_core::{ModEntry, ModVersion};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    installed: BTreeMap<String, ModVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<NaiveDateTime>,
}

/// Installed Workshop versions, persisted as JSON between runs.
#[derive(Debug, Clone)]
pub struct ModsLedger {
    path: PathBuf,
    installed: BTreeMap<String, ModVersion>,
}

impl ModsLedger {
    /// Read the ledger at `path`; a missing file is an empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> ServerErrorResult<Self> {
        let path = path.into();
        if !path.exists() {
            debug!("No mod state at {}, starting empty", path.display());
            return Ok(Self {
                path,
                installed: BTreeMap::new(),
            });
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| ServerError::io(&path, e))?;
        let file: LedgerFile =
            serde_json::from_str(&contents).map_err(|e| ServerError::ledger(&path, e.to_string()))?;

        info!(
            "Loaded {} installed mod version(s) from {}",
            file.installed.len(),
            path.display()
        );
        Ok(Self {
            path,
            installed: file.installed,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn installed(&self, workshop_id: &str) -> Option<ModVersion> {
        self.installed.get(workshop_id).copied()
    }

    /// Take the installed versions from engine entries. Returns whether
    /// anything changed.
    pub fn record(&mut self, entries: &[ModEntry]) -> bool {
        let installed: BTreeMap<String, ModVersion> = entries
            .iter()
            .filter_map(|entry| {
                entry
                    .installed_version
                    .map(|version| (entry.workshop_id.clone(), version))
            })
            .collect();

        let changed = installed != self.installed;
        self.installed = installed;
        changed
    }

    /// Write the ledger through a temp file and rename.
    pub fn save(&self) -> ServerErrorResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ServerError::io(parent, e))?;
        }

        let file = LedgerFile {
            installed: self.installed.clone(),
            saved_at: Some(Utc::now().naive_utc()),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| ServerError::ledger(&self.path, e.to_string()))?;

        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, json).map_err(|e| ServerError::io(&temp, e))?;
        std::fs::rename(&temp, &self.path).map_err(|e| ServerError::io(&self.path, e))?;

        debug!("Saved mod state to {}", self.path.display());
        Ok(())
    }
}
