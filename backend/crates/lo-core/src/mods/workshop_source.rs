use crate::{ModVersion, Result as CoreResult};

use std::path::Path;

use async_trait::async_trait;

/// Where mod payloads and their published versions come from.
#[async_trait]
pub trait WorkshopSource: Send + Sync {
    async fn check_version(&self, workshop_id: &str) -> CoreResult<ModVersion>;

    /// Fetch the current payload into `dest`, an empty directory.
    async fn download(&self, workshop_id: &str, dest: &Path) -> CoreResult<()>;
}
