use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Frame buffer does not match {width}x{height} RGB")]
    InvalidFrame { width: u32, height: u32 },
    #[error("Capture failed: {0}")]
    Capture(String),
    #[error("Remote transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Remote store holds no artifacts")]
    EmptyRemote,
    #[error("Cannot read a capture date from '{0}'")]
    InvalidArtifactDate(String),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Signal handler error: {0}")]
    Signal(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status:?}: {stderr}")]
    CommandFailed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid date prefix '{0}'")]
    InvalidPrefix(String),
    #[error("Malformed listing line '{0}'")]
    MalformedListing(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
