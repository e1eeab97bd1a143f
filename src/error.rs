use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const NOT_AUTHENTICATED: &str = "Authentication required. Please log in to the Control Room.";
pub const CONTENT_SCRIPT_NOT_READY: &str =
    "Extension not connected to this page. Please refresh and try again.";
pub const BASE_URL_MISSING: &str = "API base URL not initialized";

#[derive(Debug, Error)]
pub enum Error {
    /// No auth token held, or the server rejected it.
    #[error("{0}")]
    Auth(String),

    /// Base origin not resolved or a config file could not be used.
    #[error("{0}")]
    Config(String),

    /// The extension (or the page handler behind it) did not answer.
    #[error("{0}")]
    Connection(String),

    /// Non-2xx response, carrying the best-effort server message.
    #[error("{message}")]
    Request { status: u16, message: String },

    #[error("{0}")]
    Parse(String),

    #[error("Failed to get default package versions: {0}")]
    DefaultVersions(#[source] Box<Error>),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("config write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse category the UI uses to pick how to present a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Authentication,
    Connection,
    Api,
    Generic,
}

impl Error {
    pub fn not_authenticated() -> Self {
        Error::Auth(NOT_AUTHENTICATED.to_string())
    }

    pub fn not_connected() -> Self {
        Error::Connection(CONTENT_SCRIPT_NOT_READY.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Auth(_) => ErrorKind::Authentication,
            Error::Request { status, .. } if *status == 401 || *status == 403 => {
                ErrorKind::Authentication
            }
            Error::Connection(_) => ErrorKind::Connection,
            Error::Request { .. } | Error::Http(_) | Error::DefaultVersions(_) | Error::NotFound(_) => {
                ErrorKind::Api
            }
            _ => ErrorKind::Generic,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
