use crate::{Notification, Result as CoreResult};

use async_trait::async_trait;

/// Outbound transport for notifications. Delivery is best effort: callers
/// log a failed send and carry on.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, notification: &Notification) -> CoreResult<()>;
}
