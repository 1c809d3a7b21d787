
use lo_config::Config;

use std::path::Path;

/// A configuration that passes validation, rooted at `folder`.
pub(crate) fn valid_config(folder: &Path) -> Config {
    let mut config = Config::default();
    config.server.folder_path = folder.display().to_string();
    config.server.backend = "https://backend.example".to_string();
    config.server.customer_key = "customer".to_string();
    config.server.provider_key = "provider".to_string();
    config.server.connection_ip = "203.0.113.7".to_string();
    config
}
