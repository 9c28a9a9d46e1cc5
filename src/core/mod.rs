pub mod archive;
pub mod config;
pub mod error;
pub mod remote;
pub mod video;

pub use error::{ArchiveError, ArchiveResult, ConfigError, TransportError};
