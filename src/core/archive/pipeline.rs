use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error, info};

use super::governor::BackpressureGovernor;
use super::retention::{RetentionEnforcer, RetentionOutcome};
use super::scheduler::{ArchivalScheduler, SaveReason, SchedulerConfig, TickAction};
use super::uploader::{SubmitOutcome, Uploader};
use super::writer::{ArtifactPaths, DualTierWriter};
use crate::core::config::{ArchiverConfig, PriorFramePolicy};
use crate::core::error::{ArchiveError, ArchiveResult};
use crate::core::remote::RemoteStore;
use crate::core::video::{Frame, FrameSource, HistogramCorrelation, SimilarityEstimator};

#[derive(Debug)]
pub enum SaveResult {
    Saved {
        paths: ArtifactPaths,
        upload: SubmitOutcome,
    },
    Failed(ArchiveError),
}

#[derive(Debug)]
pub struct TickReport {
    pub frame_number: u64,
    pub action: TickAction,
    pub save: Option<SaveResult>,
    pub retention: Option<ArchiveResult<RetentionOutcome>>,
}

impl TickReport {
    pub fn saved(&self) -> bool {
        matches!(self.save, Some(SaveResult::Saved { .. }))
    }
}

/// 管线统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub ticks: u64,
    pub motion_saves: u64,
    pub autosaves: u64,
    pub save_failures: u64,
    pub retention_runs: u64,
    pub retention_failures: u32,
    pub uploads_throttled: u64,
    pub uploads_dropped: u64,
    pub uploads_ok: u64,
    pub uploads_failed: u64,
    pub upload_queue_depth: usize,
}

/// One capture session: everything that changes tick to tick lives here.
pub struct ArchivePipeline {
    estimator: Box<dyn SimilarityEstimator>,
    scheduler: ArchivalScheduler,
    writer: DualTierWriter,
    uploader: Uploader,
    enforcer: RetentionEnforcer,
    governor: BackpressureGovernor,
    prior_policy: PriorFramePolicy,
    prior: Option<Frame>,
    stats: PipelineStats,
}

impl ArchivePipeline {
    pub fn new(
        estimator: Box<dyn SimilarityEstimator>,
        scheduler: ArchivalScheduler,
        writer: DualTierWriter,
        uploader: Uploader,
        enforcer: RetentionEnforcer,
        governor: BackpressureGovernor,
        prior_policy: PriorFramePolicy,
    ) -> Self {
        Self {
            estimator,
            scheduler,
            writer,
            uploader,
            enforcer,
            governor,
            prior_policy,
            prior: None,
            stats: PipelineStats::default(),
        }
    }

    pub fn from_config(config: &ArchiverConfig, remote: Arc<dyn RemoteStore>) -> ArchiveResult<Self> {
        Ok(Self::new(
            Box::new(HistogramCorrelation::new()),
            ArchivalScheduler::with_config(SchedulerConfig::from_config(
                &config.motion,
                &config.retention,
            )),
            DualTierWriter::from_config(&config.storage),
            Uploader::from_config(Arc::clone(&remote), &config.upload)?,
            RetentionEnforcer::new(remote, config.retention.days),
            BackpressureGovernor::with_limit(config.retention.failure_limit),
            config.motion.prior_frame,
        ))
    }

    pub fn tick(&mut self, frame: Frame) -> TickReport {
        let score = self
            .prior
            .as_ref()
            .map(|prior| self.estimator.score(prior, &frame));
        let plan = self.scheduler.plan(score);

        if let Some(score) = score {
            if self.scheduler.is_motion(score) {
                info!("🟢 {:.4}", score);
            } else {
                debug!("{:.4}", score);
            }
        }

        let save = match plan.action {
            TickAction::Keep { reason, .. } => Some(self.persist(&frame, reason)),
            TickAction::Prime | TickAction::Discard { .. } => None,
        };

        let retention = plan.enforce_retention.then(|| self.run_retention());

        let replace_prior = match self.prior_policy {
            PriorFramePolicy::EveryCapture => true,
            // a keep whose write failed does not become the baseline
            PriorFramePolicy::KeptOnly => {
                matches!(plan.action, TickAction::Prime)
                    || matches!(save, Some(SaveResult::Saved { .. }))
            }
        };
        let frame_number = frame.frame_number;
        if replace_prior {
            self.prior = Some(frame);
        }

        TickReport {
            frame_number,
            action: plan.action,
            save,
            retention,
        }
    }

    fn persist(&mut self, frame: &Frame, reason: SaveReason) -> SaveResult {
        match reason {
            SaveReason::Motion => self.stats.motion_saves += 1,
            SaveReason::Autosave => self.stats.autosaves += 1,
        }

        match self.writer.write(frame) {
            Ok(paths) => {
                let upload = self.uploader.submit(
                    paths.staging.clone(),
                    paths.file_name.clone(),
                    &self.governor,
                );
                SaveResult::Saved { paths, upload }
            }
            Err(e) => {
                error!("❌ Failed to save frame #{}: {}", frame.frame_number, e);
                self.stats.save_failures += 1;
                SaveResult::Failed(e)
            }
        }
    }

    fn run_retention(&mut self) -> ArchiveResult<RetentionOutcome> {
        self.stats.retention_runs += 1;
        let result = self.enforcer.enforce(&mut self.governor);
        let stats = self.stats();
        info!(
            "📊 ticks={} saved={}+{} failed={} retention_failures={} uploads ok={} failed={} throttled={} dropped={} queued={}",
            stats.ticks,
            stats.motion_saves,
            stats.autosaves,
            stats.save_failures,
            stats.retention_failures,
            stats.uploads_ok,
            stats.uploads_failed,
            stats.uploads_throttled,
            stats.uploads_dropped,
            stats.upload_queue_depth
        );
        result
    }

    /// Capture and process ticks until `shutdown` is raised.
    ///
    /// The flag is checked between ticks, so the current tick always
    /// completes. Capture errors are logged and the loop carries on.
    pub fn run<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        interval: Duration,
        shutdown: &AtomicBool,
    ) {
        info!("🎬 Archiving started, one frame every {:?}", interval);
        while !shutdown.load(Ordering::SeqCst) {
            match source.capture() {
                Ok(frame) => {
                    self.tick(frame);
                }
                Err(e) => error!("❌ Capture failed: {}", e),
            }
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            thread::sleep(interval);
        }
        info!("🛑 Archiving stopped after {} ticks", self.scheduler.tick_count());
    }

    pub fn stats(&self) -> PipelineStats {
        let uploads = self.uploader.get_stats();
        PipelineStats {
            ticks: self.scheduler.tick_count(),
            retention_failures: self.governor.failure_count(),
            uploads_throttled: uploads.throttled,
            uploads_dropped: uploads.dropped,
            uploads_ok: uploads.uploaded,
            uploads_failed: uploads.failed,
            upload_queue_depth: self.uploader.queue_depth(),
            ..self.stats.clone()
        }
    }

    /// Hand the uploader back, e.g. to drain it on shutdown.
    pub fn into_uploader(self) -> Uploader {
        self.uploader
    }
}
