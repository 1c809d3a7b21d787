use std::panic::Location;
use std::path::PathBuf;

use error_location::ErrorLocation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Config error: {0}")]
    Config(#[from] lo_config::ConfigError),

    #[error("Engine error: {0}")]
    Core(#[from] lo_core::CoreError),

    #[error("Logger error: {message}")]
    Logger { message: String },

    #[error("Request to {url} failed: {source} {location}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
        location: ErrorLocation,
    },

    #[error("{url} returned HTTP {status} {location}")]
    Status {
        url: String,
        status: u16,
        location: ErrorLocation,
    },

    #[error("Unexpected response from {url}: {message} {location}")]
    Schema {
        url: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("steamcmd failed: {message} {location}")]
    Steamcmd {
        message: String,
        location: ErrorLocation,
    },

    #[error("IO error on {path}: {source} {location}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Mod state file {path} is unreadable: {message} {location}")]
    Ledger {
        path: PathBuf,
        message: String,
        location: ErrorLocation,
    },
}

impl ServerError {
    #[track_caller]
    pub fn http(url: &str, source: reqwest::Error) -> Self {
        Self::Http {
            url: url.to_string(),
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn status(url: &str, status: u16) -> Self {
        Self::Status {
            url: url.to_string(),
            status,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn schema<S: Into<String>>(url: &str, message: S) -> Self {
        Self::Schema {
            url: url.to_string(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn steamcmd<S: Into<String>>(message: S) -> Self {
        Self::Steamcmd {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn ledger<S: Into<String>>(path: impl Into<PathBuf>, message: S) -> Self {
        Self::Ledger {
            path: path.into(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Transport failures, throttling and server-side errors may clear up on
    /// their own; a malformed response will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
