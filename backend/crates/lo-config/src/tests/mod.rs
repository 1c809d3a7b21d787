mod supervisor;

use std::env;

use tempfile::TempDir;

/// RAII guard for environment variables - automatically restores on drop
pub(crate) struct EnvGuard {
    key: &'static str,
    original: Option<String>,
}

impl EnvGuard {
    pub(crate) fn set(key: &'static str, value: &str) -> Self {
        unsafe {
            let original = env::var(key).ok();
            env::set_var(key, value);
            Self { key, original }
        }
    }

    pub(crate) fn remove(key: &'static str) -> Self {
        unsafe {
            let original = env::var(key).ok();
            env::remove_var(key);
            Self { key, original }
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        unsafe {
            match &self.original {
                Some(val) => env::set_var(self.key, val),
                None => env::remove_var(self.key),
            }
        }
    }
}

/// Create a temp config directory and set LO_CONFIG_DIR
pub(crate) fn setup_config_dir() -> (TempDir, EnvGuard) {
    let temp = TempDir::new().unwrap();
    let guard = EnvGuard::set("LO_CONFIG_DIR", temp.path().to_str().unwrap());
    (temp, guard)
}

/// Settings without which no tile can be launched.
pub(crate) fn required_server_env() -> Vec<EnvGuard> {
    vec![
        EnvGuard::set("LO_SERVER_FOLDER_PATH", "C:/lastoasis"),
        EnvGuard::set("LO_SERVER_BACKEND", "https://backend.example.com"),
        EnvGuard::set("LO_SERVER_CUSTOMER_KEY", "customer-secret"),
        EnvGuard::set("LO_SERVER_PROVIDER_KEY", "provider-secret"),
        EnvGuard::set("LO_SERVER_CONNECTION_IP", "203.0.113.10"),
    ]
}
