//! Remote low-quality store.
//!
//! The archiver needs three primitives from the remote side: push a file,
//! find the oldest artifact, and drop every artifact of one capture date.
//! Transports only move bytes; the artifact naming contract lives in
//! [`crate::core::archive::artifact`].

pub mod local;
pub mod ssh;

use std::path::Path;
use std::time::SystemTime;

use crate::core::error::TransportError;

pub use local::LocalDirRemote;
pub use ssh::SshRemote;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteArtifact {
    pub name: String,
    pub modified: SystemTime,
}

pub trait RemoteStore: Send + Sync {
    /// Copy `local` to the remote store as `remote_name`.
    fn upload(&self, local: &Path, remote_name: &str) -> Result<(), TransportError>;

    /// Artifact with the oldest modification time, `None` when the store is empty.
    fn oldest_artifact(&self) -> Result<Option<RemoteArtifact>, TransportError>;

    /// Delete every artifact whose name starts with `date_prefix` (`YYYYMMDD`).
    /// Returns how many were removed.
    fn delete_date(&self, date_prefix: &str) -> Result<usize, TransportError>;
}

/// Only eight ASCII digits may reach a delete glob.
pub fn check_date_prefix(prefix: &str) -> Result<(), TransportError> {
    if prefix.len() == 8 && prefix.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(TransportError::InvalidPrefix(prefix.to_string()))
    }
}

/// Oldest by modification time, ties broken by name.
pub(crate) fn pick_oldest<I>(artifacts: I) -> Option<RemoteArtifact>
where
    I: IntoIterator<Item = RemoteArtifact>,
{
    artifacts
        .into_iter()
        .min_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)))
}
