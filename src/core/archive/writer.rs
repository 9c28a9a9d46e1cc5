use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use image::{ImageOutputFormat, RgbImage};
use log::debug;

use super::artifact;
use crate::core::config::StorageConfig;
use crate::core::error::{ArchiveError, ArchiveResult};
use crate::core::video::Frame;

/// Where one kept frame ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// `YYYYMMDD-HHMMSS.ffff.jpg`, shared by both tiers and the remote copy.
    pub file_name: String,
    pub hq: PathBuf,
    pub staging: PathBuf,
}

/// Writes each kept frame twice: a high-quality local copy and a
/// low-quality staging copy bound for the remote store.
#[derive(Debug, Clone)]
pub struct DualTierWriter {
    hq_root: PathBuf,
    staging_root: PathBuf,
    hq_quality: u8,
    lq_quality: u8,
    per_day_folders: bool,
}

impl DualTierWriter {
    pub fn new(hq_root: impl Into<PathBuf>, staging_root: impl Into<PathBuf>) -> Self {
        Self {
            hq_root: hq_root.into(),
            staging_root: staging_root.into(),
            hq_quality: 90,
            lq_quality: 30,
            per_day_folders: true,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            hq_root: config.root.join(&config.hq_dir),
            staging_root: config.root.join(&config.staging_dir),
            hq_quality: config.hq_quality,
            lq_quality: config.lq_quality,
            per_day_folders: config.per_day_folders,
        }
    }

    pub fn with_qualities(mut self, hq_quality: u8, lq_quality: u8) -> Self {
        self.hq_quality = hq_quality;
        self.lq_quality = lq_quality;
        self
    }

    pub fn with_per_day_folders(mut self, enabled: bool) -> Self {
        self.per_day_folders = enabled;
        self
    }

    pub fn write(&self, frame: &Frame) -> ArchiveResult<ArtifactPaths> {
        let file_name = artifact::artifact_file_name(&frame.captured_at);
        let hq_dir = if self.per_day_folders {
            self.hq_root.join(&file_name[..8])
        } else {
            self.hq_root.clone()
        };
        ensure_dir(&hq_dir)?;
        ensure_dir(&self.staging_root)?;

        let image = frame.to_image()?;

        let hq = hq_dir.join(&file_name);
        write_atomic(&hq, &Self::compress_to_jpeg(&image, self.hq_quality)?)?;

        let staging = self.staging_root.join(&file_name);
        write_atomic(&staging, &Self::compress_to_jpeg(&image, self.lq_quality)?)?;

        debug!("💾 Saved {} (hq {}, lq {})", file_name, self.hq_quality, self.lq_quality);
        Ok(ArtifactPaths {
            file_name,
            hq,
            staging,
        })
    }

    fn compress_to_jpeg(image: &RgbImage, quality: u8) -> ArchiveResult<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageOutputFormat::Jpeg(quality))?;
        Ok(buffer.into_inner())
    }
}

fn ensure_dir(path: &Path) -> ArchiveResult<()> {
    fs::create_dir_all(path).map_err(|source| ArchiveError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Write to `<path>.part` and rename, so `path` only ever holds a complete file.
fn write_atomic(path: &Path, bytes: &[u8]) -> ArchiveResult<()> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let result = (|| -> std::io::Result<()> {
        let mut file = File::create(&partial)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&partial, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&partial);
        return Err(e.into());
    }
    Ok(())
}
