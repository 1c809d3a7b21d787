mod fanout_sink;
mod log_sink;
mod notification;
mod notification_sink;

pub use fanout_sink::FanoutSink;
pub use log_sink::LogSink;
pub use notification::{Notification, NotificationKind};
pub use notification_sink::NotificationSink;
