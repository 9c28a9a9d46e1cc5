use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use super::{check_date_prefix, pick_oldest, RemoteArtifact, RemoteStore};
use crate::core::error::TransportError;

/// Remote store backed by a directory, e.g. a mounted network share.
#[derive(Debug, Clone)]
pub struct LocalDirRemote {
    base: PathBuf,
}

impl LocalDirRemote {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

impl RemoteStore for LocalDirRemote {
    fn upload(&self, local: &Path, remote_name: &str) -> Result<(), TransportError> {
        fs::create_dir_all(&self.base)?;
        let target = self.base.join(remote_name);
        let partial = self.base.join(format!("{}.part", remote_name));
        fs::copy(local, &partial)?;
        if let Err(e) = fs::rename(&partial, &target) {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }
        debug!("📤 Copied {} -> {}", local.display(), target.display());
        Ok(())
    }

    fn oldest_artifact(&self) -> Result<Option<RemoteArtifact>, TransportError> {
        let mut artifacts = Vec::new();
        for entry in fs::read_dir(&self.base)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".jpg") {
                continue;
            }
            artifacts.push(RemoteArtifact {
                name,
                modified: metadata.modified()?,
            });
        }
        Ok(pick_oldest(artifacts))
    }

    fn delete_date(&self, date_prefix: &str) -> Result<usize, TransportError> {
        check_date_prefix(date_prefix)?;
        let mut removed = 0;
        for entry in fs::read_dir(&self.base)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with(date_prefix) {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    fn touch(dir: &Path, name: &str, age_secs: u64) {
        let file = File::create(dir.join(name)).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    #[test]
    fn test_upload_copies_under_remote_name() {
        let staging = tempfile::tempdir().unwrap();
        let remote_dir = tempfile::tempdir().unwrap();
        let local = staging.path().join("x.jpg");
        fs::write(&local, b"jpeg").unwrap();

        let remote = LocalDirRemote::new(remote_dir.path().join("lq"));
        remote.upload(&local, "20240101-000000.0000.jpg").unwrap();

        let copied = remote.base().join("20240101-000000.0000.jpg");
        assert_eq!(fs::read(copied).unwrap(), b"jpeg");
        assert!(local.exists());
    }

    #[test]
    fn test_oldest_by_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "20240105-000000.0000.jpg", 10);
        touch(dir.path(), "20240103-000000.0000.jpg", 300);
        touch(dir.path(), "20240101-000000.0000.jpg", 100);
        touch(dir.path(), "notes.txt", 9999);

        let remote = LocalDirRemote::new(dir.path());
        let oldest = remote.oldest_artifact().unwrap().unwrap();
        assert_eq!(oldest.name, "20240103-000000.0000.jpg");
    }

    #[test]
    fn test_empty_store_has_no_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let remote = LocalDirRemote::new(dir.path());
        assert!(remote.oldest_artifact().unwrap().is_none());
    }

    #[test]
    fn test_delete_date_only_touches_prefix() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "20240101-010000.0000.jpg",
            "20240101-235959.9999.jpg",
            "20240102-000000.0000.jpg",
        ] {
            touch(dir.path(), name, 0);
        }

        let remote = LocalDirRemote::new(dir.path());
        assert_eq!(remote.delete_date("20240101").unwrap(), 2);
        assert!(dir.path().join("20240102-000000.0000.jpg").exists());
        assert!(matches!(
            remote.delete_date("2024*"),
            Err(TransportError::InvalidPrefix(_))
        ));
    }
}
