use lo_core::{CoreError, Notification, NotificationKind, NotificationSink, Result as CoreResult};

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

const SINK_NAME: &str = "discord";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Discord rejects message content longer than this.
const MAX_CONTENT_CHARS: usize = 2000;

#[derive(Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
}

/// Posts operator-relevant notifications to a Discord webhook.
pub struct DiscordSink {
    client: reqwest::Client,
    webhook_url: String,
}

impl DiscordSink {
    pub fn new(webhook_url: impl Into<String>) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CoreError::notify(SINK_NAME, e.to_string()))?;

        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
        })
    }

    /// In-game broadcasts stay in game.
    pub fn posts(kind: NotificationKind) -> bool {
        !matches!(kind, NotificationKind::Broadcast)
    }

    pub fn format(notification: &Notification) -> String {
        let mut content = match (&notification.tile_id, &notification.mod_id) {
            (Some(tile), _) => format!("**{tile}** {}", notification.message),
            (None, Some(workshop_id)) => format!("**Mod {workshop_id}** {}", notification.message),
            (None, None) => notification.message.clone(),
        };

        if let Some(cut) = content.char_indices().nth(MAX_CONTENT_CHARS).map(|(i, _)| i) {
            content.truncate(cut);
        }
        content
    }
}

#[async_trait]
impl NotificationSink for DiscordSink {
    fn name(&self) -> &str {
        SINK_NAME
    }

    async fn send(&self, notification: &Notification) -> CoreResult<()> {
        if !Self::posts(notification.kind) {
            return Ok(());
        }

        let content = Self::format(notification);
        // Errors must not carry the webhook url.
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&WebhookMessage { content: &content })
            .send()
            .await
            .map_err(|e| CoreError::notify(SINK_NAME, e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::notify(
                SINK_NAME,
                format!("webhook returned HTTP {}", status.as_u16()),
            ));
        }
        Ok(())
    }
}
