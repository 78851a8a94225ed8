use std::io;

use mavlink_codec::ProtocolError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    /// Send attempted while the session is disconnected. No I/O was performed.
    #[error("not connected to a ground station")]
    NotConnected,

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] ProtocolError),

    #[error("{count} {what} exceed the protocol limit of {max}")]
    TooManyItems { what: &'static str, count: usize, max: usize },

    #[error("upload cancelled")]
    Cancelled,
}

/// Coarse error class reported alongside a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotConnected,
    Transport,
    Encoding,
    Limit,
    Cancelled,
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::NotConnected => ErrorKind::NotConnected,
            UploadError::Transport(_) => ErrorKind::Transport,
            UploadError::Encoding(_) => ErrorKind::Encoding,
            UploadError::TooManyItems { .. } => ErrorKind::Limit,
            UploadError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: String, source: io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, source: toml::de::Error },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
