use crate::{Notification, NotificationKind, NotificationSink, Result as CoreResult};

use async_trait::async_trait;
use log::{info, warn};

/// Writes every notification to the application log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> CoreResult<()> {
        let scope = notification
            .tile_id
            .as_deref()
            .or(notification.mod_id.as_deref())
            .unwrap_or("fleet");

        match notification.kind {
            NotificationKind::TileCrashed
            | NotificationKind::LaunchFailed
            | NotificationKind::ModUpdateFailed => {
                warn!("[{scope}] {}", notification.message);
            }
            NotificationKind::ServerUpdate if notification.error_kind.is_some() => {
                warn!("[{scope}] {}", notification.message);
            }
            _ => info!("[{scope}] {}", notification.message),
        }
        Ok(())
    }
}
