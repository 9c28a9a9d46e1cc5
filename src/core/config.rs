//! Archiver configuration loaded from TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use serde::Deserialize;

use crate::core::error::ConfigError;

pub const CONFIG_ENV: &str = "MOTION_ARCHIVER_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "motion-archiver.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiverConfig {
    pub capture: CaptureConfig,
    pub motion: MotionConfig,
    pub storage: StorageConfig,
    pub remote: RemoteConfig,
    pub retention: RetentionConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// Program and arguments that print one encoded image to stdout.
    pub command: Vec<String>,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let command = [
            "ffmpeg",
            "-loglevel",
            "error",
            "-f",
            "v4l2",
            "-video_size",
            "960x720",
            "-i",
            "/dev/video0",
            "-frames:v",
            "1",
            "-f",
            "image2pipe",
            "-vcodec",
            "mjpeg",
            "-",
        ];
        Self {
            command: command.iter().map(|s| s.to_string()).collect(),
            width: 640,
            height: 480,
            fps: 2.0,
        }
    }
}

impl CaptureConfig {
    /// `1 / fps`; saturates for rates `validate` would reject.
    pub fn tick_interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.fps).unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutosaveCadence {
    /// Counter cycles over the period on every compared tick, saves or not.
    Fixed,
    /// Any save restarts the period.
    SinceLastSave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorFramePolicy {
    EveryCapture,
    KeptOnly,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotionConfig {
    pub threshold: f64,
    pub autosave_period: u32,
    pub autosave_cadence: AutosaveCadence,
    pub prior_frame: PriorFramePolicy,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            threshold: 2.985,
            autosave_period: 6,
            autosave_cadence: AutosaveCadence::Fixed,
            prior_frame: PriorFramePolicy::EveryCapture,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub hq_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub hq_quality: u8,
    pub lq_quality: u8,
    pub per_day_folders: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            hq_dir: PathBuf::from("hq"),
            staging_dir: PathBuf::from("temp"),
            hq_quality: 90,
            lq_quality: 30,
            per_day_folders: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Ssh,
    Local,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    pub transport: TransportKind,
    /// `user@host` for ssh; ignored by the local transport.
    pub host: String,
    pub base_path: PathBuf,
    pub ssh_program: String,
    pub scp_program: String,
    pub connect_timeout_secs: Option<u64>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Ssh,
            host: "myusername@myserverip".to_string(),
            base_path: PathBuf::from("/home/seguridad/lq"),
            ssh_program: "ssh".to_string(),
            scp_program: "scp".to_string(),
            connect_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionConfig {
    pub days: i64,
    pub check_period: u32,
    pub failure_limit: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: 2,
            check_period: 9999,
            failure_limit: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadFailurePolicy {
    /// Delete the staging copy whatever the transfer outcome.
    Discard,
    /// Leave the staging copy in place when the transfer fails.
    Keep,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub on_failure: UploadFailurePolicy,
    pub drain_on_exit: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().clamp(1, 4),
            queue_capacity: 64,
            on_failure: UploadFailurePolicy::Discard,
            drain_on_exit: false,
        }
    }
}

impl ArchiverConfig {
    /// Resolve the config path from the environment and load it.
    ///
    /// A missing default file yields the built-in defaults; a missing file
    /// named explicitly through the environment is an error.
    pub fn load_default() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::load(path)
                } else {
                    info!("⚙️ No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    let config = Self::default();
                    config.validate()?;
                    Ok(config)
                }
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text)?;
        info!("⚙️ Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let capture = &self.capture;
        if capture.command.is_empty() || capture.command[0].trim().is_empty() {
            return Err(ConfigError::invalid("capture.command", "must name a program"));
        }
        if capture.width == 0 || capture.height == 0 {
            return Err(ConfigError::invalid(
                "capture.width/height",
                "dimensions must be non-zero",
            ));
        }
        if !capture.fps.is_finite() || capture.fps <= 0.0 {
            return Err(ConfigError::invalid("capture.fps", "must be a positive number"));
        }
        if Duration::try_from_secs_f64(1.0 / capture.fps).is_err() {
            return Err(ConfigError::invalid(
                "capture.fps",
                format!("{} gives a tick interval too long to represent", capture.fps),
            ));
        }

        let motion = &self.motion;
        if !(-3.0..=3.0).contains(&motion.threshold) {
            return Err(ConfigError::invalid(
                "motion.threshold",
                format!("{} is outside [-3, 3]", motion.threshold),
            ));
        }
        if motion.autosave_period == 0 {
            return Err(ConfigError::invalid("motion.autosave_period", "must be at least 1"));
        }

        for (field, quality) in [
            ("storage.hq_quality", self.storage.hq_quality),
            ("storage.lq_quality", self.storage.lq_quality),
        ] {
            if !(1..=100).contains(&quality) {
                return Err(ConfigError::invalid(field, format!("{} is outside 1..=100", quality)));
            }
        }

        if self.remote.transport == TransportKind::Ssh && self.remote.host.trim().is_empty() {
            return Err(ConfigError::invalid("remote.host", "required for the ssh transport"));
        }

        if self.retention.days < 0 {
            return Err(ConfigError::invalid("retention.days", "must not be negative"));
        }
        if self.retention.check_period == 0 {
            return Err(ConfigError::invalid("retention.check_period", "must be at least 1"));
        }

        if self.upload.workers == 0 {
            return Err(ConfigError::invalid("upload.workers", "must be at least 1"));
        }
        if self.upload.queue_capacity == 0 {
            return Err(ConfigError::invalid("upload.queue_capacity", "must be at least 1"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_capture_script() {
        let config = ArchiverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.motion.threshold, 2.985);
        assert_eq!(config.motion.autosave_period, 6);
        assert_eq!(config.retention.check_period, 9999);
        assert_eq!(config.retention.failure_limit, 4);
        assert_eq!(config.retention.days, 2);
        assert_eq!(config.storage.hq_quality, 90);
        assert_eq!(config.storage.lq_quality, 30);
        assert_eq!(config.capture.tick_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ArchiverConfig::from_toml(
            r#"
            [motion]
            threshold = 2.9
            autosave_cadence = "since_last_save"
            prior_frame = "kept_only"

            [remote]
            transport = "local"
            base_path = "/mnt/share/lq"

            [upload]
            on_failure = "keep"
            "#,
        )
        .unwrap();

        assert_eq!(config.motion.threshold, 2.9);
        assert_eq!(config.motion.autosave_period, 6);
        assert_eq!(config.motion.autosave_cadence, AutosaveCadence::SinceLastSave);
        assert_eq!(config.motion.prior_frame, PriorFramePolicy::KeptOnly);
        assert_eq!(config.remote.transport, TransportKind::Local);
        assert_eq!(config.remote.base_path, PathBuf::from("/mnt/share/lq"));
        assert_eq!(config.upload.on_failure, UploadFailurePolicy::Keep);
        assert_eq!(config.capture.width, 640);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let err = ArchiverConfig::from_toml("[storage]\nlq_quality = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "storage.lq_quality",
                ..
            }
        ));

        let err = ArchiverConfig::from_toml("[motion]\nthreshold = 3.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "motion.threshold", .. }));

        let err = ArchiverConfig::from_toml("[capture]\nfps = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "capture.fps", .. }));

        let err = ArchiverConfig::from_toml("[capture]\nfps = 1e-30\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "capture.fps", .. }));
        let slow = CaptureConfig {
            fps: 1e-30,
            ..CaptureConfig::default()
        };
        assert_eq!(slow.tick_interval(), Duration::MAX);
    }

    #[test]
    fn test_unknown_key_is_a_parse_error() {
        let err = ArchiverConfig::from_toml("[motion]\nthreshhold = 2.9\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArchiverConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
