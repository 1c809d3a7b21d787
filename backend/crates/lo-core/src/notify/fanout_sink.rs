use crate::{Notification, NotificationSink, Result as CoreResult};

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use log::warn;

/// Delivers each notification to every inner sink concurrently. A failing
/// sink is logged and never stops the others.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl NotificationSink for FanoutSink {
    fn name(&self) -> &str {
        "fanout"
    }

    async fn send(&self, notification: &Notification) -> CoreResult<()> {
        let sends = self.sinks.iter().map(|sink| sink.send(notification));
        for (sink, result) in self.sinks.iter().zip(join_all(sends).await) {
            if let Err(e) = result {
                warn!("Notification via {} failed: {e}", sink.name());
            }
        }
        Ok(())
    }
}
