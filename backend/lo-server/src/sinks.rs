use crate::{AdminMessageSink, DiscordSink, Result as ServerErrorResult, admin_message_targets};

use lo_config::Config;
use lo_core::{FanoutSink, LogSink};

use std::sync::Arc;
use std::time::Duration;

/// Every configured transport behind one sink. The log sink is always on.
pub fn notification_sink(config: &Config) -> ServerErrorResult<FanoutSink> {
    let mut sink = FanoutSink::new(vec![Arc::new(LogSink)]);

    if let Some(webhook) = &config.notifications.discord_webhook {
        sink.push(Arc::new(DiscordSink::new(webhook.clone())?));
    }

    if config.notifications.admin_messages {
        sink.push(Arc::new(AdminMessageSink::new(
            admin_message_targets(&config.server),
            Duration::from_secs(config.notifications.admin_message_clear_secs),
        )));
    }

    Ok(sink)
}
