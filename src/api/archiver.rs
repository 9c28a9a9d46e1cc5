//! 运动归档器

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::info;

use crate::core::archive::{ArchivePipeline, PipelineStats};
use crate::core::config::{ArchiverConfig, TransportKind};
use crate::core::error::ArchiveResult;
use crate::core::remote::{LocalDirRemote, RemoteStore, SshRemote};
use crate::core::video::CommandFrameSource;

/// Camera → motion check → dual-tier save → upload → remote retention.
///
/// ```ignore
/// let config = ArchiverConfig::load_default()?;
/// let mut archiver = MotionArchiver::create(config)?;
/// archiver.run(&shutdown);
/// ```
pub struct MotionArchiver {
    config: ArchiverConfig,
    source: CommandFrameSource,
    pipeline: ArchivePipeline,
}

impl MotionArchiver {
    pub fn create(config: ArchiverConfig) -> ArchiveResult<Self> {
        config.validate()?;
        let remote = Self::remote_from_config(&config);
        let source = CommandFrameSource::from_config(&config.capture)?;
        let pipeline = ArchivePipeline::from_config(&config, remote)?;
        info!(
            "🎬 MotionArchiver: created ({}x{} @ {} fps, threshold {})",
            config.capture.width, config.capture.height, config.capture.fps, config.motion.threshold
        );
        Ok(Self {
            config,
            source,
            pipeline,
        })
    }

    fn remote_from_config(config: &ArchiverConfig) -> Arc<dyn RemoteStore> {
        match config.remote.transport {
            TransportKind::Ssh => {
                info!(
                    "🔐 Remote store: {}:{}",
                    config.remote.host,
                    config.remote.base_path.display()
                );
                Arc::new(SshRemote::from_config(&config.remote))
            }
            TransportKind::Local => {
                info!("📁 Remote store: {}", config.remote.base_path.display());
                Arc::new(LocalDirRemote::new(config.remote.base_path.clone()))
            }
        }
    }

    /// Run until `shutdown` is set; optionally wait for queued uploads.
    pub fn run(mut self, shutdown: &AtomicBool) -> PipelineStats {
        let interval = self.config.capture.tick_interval();
        self.pipeline.run(&mut self.source, interval, shutdown);
        let stats = self.pipeline.stats();

        if self.config.upload.drain_on_exit {
            info!("⏳ Waiting for queued uploads");
            self.pipeline.into_uploader().drain();
        }
        stats
    }

    pub fn stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }
}
