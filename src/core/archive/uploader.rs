//! 上传器 - 固定线程池 + 有界队列

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Sender, TrySendError};
use log::{debug, info, warn};

use super::governor::BackpressureGovernor;
use crate::core::config::{UploadConfig, UploadFailurePolicy};
use crate::core::error::ArchiveResult;
use crate::core::remote::RemoteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Queued,
    /// Retention cleanup is failing; the governor holds uploads back.
    Throttled,
    /// Every worker is busy and the queue is at capacity.
    QueueFull,
}

/// 上传统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub uploaded: u64,
    pub failed: u64,
    pub throttled: u64,
    pub dropped: u64,
}

#[derive(Debug)]
struct UploadJob {
    staging: PathBuf,
    remote_name: String,
}

pub struct Uploader {
    sender: Option<Sender<UploadJob>>,
    workers: Vec<JoinHandle<()>>,
    policy: UploadFailurePolicy,
    stats: Arc<Mutex<UploadStats>>,
    pending: Arc<AtomicUsize>,
}

impl Uploader {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        workers: usize,
        queue_capacity: usize,
        policy: UploadFailurePolicy,
    ) -> ArchiveResult<Self> {
        let (sender, receiver) = channel::bounded::<UploadJob>(queue_capacity.max(1));
        let stats = Arc::new(Mutex::new(UploadStats::default()));
        let pending = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(workers.max(1));
        for i in 0..workers.max(1) {
            let receiver = receiver.clone();
            let remote = Arc::clone(&remote);
            let stats = Arc::clone(&stats);
            let pending = Arc::clone(&pending);
            let handle = thread::Builder::new()
                .name(format!("uploader-{}", i))
                .spawn(move || {
                    for job in receiver.iter() {
                        Self::process(remote.as_ref(), &job, policy, &stats);
                        pending.fetch_sub(1, Ordering::SeqCst);
                    }
                })?;
            handles.push(handle);
        }

        info!(
            "📤 Uploader started: {} workers, queue capacity {}",
            handles.len(),
            queue_capacity.max(1)
        );
        Ok(Self {
            sender: Some(sender),
            workers: handles,
            policy,
            stats,
            pending,
        })
    }

    pub fn from_config(remote: Arc<dyn RemoteStore>, config: &UploadConfig) -> ArchiveResult<Self> {
        Self::new(remote, config.workers, config.queue_capacity, config.on_failure)
    }

    /// Queue the staging copy for transfer. Never blocks.
    ///
    /// A throttled submission touches nothing: the staging copy stays on
    /// local storage.
    pub fn submit(
        &self,
        staging: PathBuf,
        remote_name: String,
        governor: &BackpressureGovernor,
    ) -> SubmitOutcome {
        if governor.should_throttle_uploads() {
            debug!(
                "⏸️ Upload of {} throttled ({} retention failures)",
                remote_name,
                governor.failure_count()
            );
            self.bump(|s| s.throttled += 1);
            return SubmitOutcome::Throttled;
        }

        let Some(sender) = self.sender.as_ref() else {
            self.bump(|s| s.dropped += 1);
            self.discard_unsent(&staging);
            return SubmitOutcome::QueueFull;
        };

        self.pending.fetch_add(1, Ordering::SeqCst);
        match sender.try_send(UploadJob {
            staging,
            remote_name,
        }) {
            Ok(()) => SubmitOutcome::Queued,
            Err(TrySendError::Full(job)) | Err(TrySendError::Disconnected(job)) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                warn!("⚠️ Upload queue full, dropping {}", job.remote_name);
                self.bump(|s| s.dropped += 1);
                self.discard_unsent(&job.staging);
                SubmitOutcome::QueueFull
            }
        }
    }

    /// Jobs waiting in the queue, not counting transfers in progress.
    pub fn queue_depth(&self) -> usize {
        self.sender.as_ref().map(|s| s.len()).unwrap_or(0)
    }

    /// Jobs queued or in progress.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn get_stats(&self) -> UploadStats {
        self.stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Close the queue and wait for every queued transfer to finish.
    pub fn drain(mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("⚠️ Upload worker panicked");
            }
        }
        info!("📤 Uploader drained");
    }

    fn process(
        remote: &dyn RemoteStore,
        job: &UploadJob,
        policy: UploadFailurePolicy,
        stats: &Mutex<UploadStats>,
    ) {
        let result = remote.upload(&job.staging, &job.remote_name);
        let keep_local = match &result {
            Ok(()) => {
                debug!("📤 Uploaded {}", job.remote_name);
                if let Ok(mut s) = stats.lock() {
                    s.uploaded += 1;
                }
                false
            }
            Err(e) => {
                warn!("⚠️ Upload of {} failed: {}", job.remote_name, e);
                if let Ok(mut s) = stats.lock() {
                    s.failed += 1;
                }
                policy == UploadFailurePolicy::Keep
            }
        };

        if !keep_local {
            remove_staging(&job.staging);
        }
    }

    fn discard_unsent(&self, staging: &Path) {
        if self.policy == UploadFailurePolicy::Discard {
            remove_staging(staging);
        }
    }

    fn bump(&self, update: impl FnOnce(&mut UploadStats)) {
        if let Ok(mut s) = self.stats.lock() {
            update(&mut s);
        }
    }
}

impl Drop for Uploader {
    fn drop(&mut self) {
        // 关闭队列；仍在运行的上传不等待
        self.sender.take();
    }
}

fn remove_staging(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("⚠️ Failed to remove staging file {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::TransportError;
    use crate::core::remote::RemoteArtifact;
    use std::sync::mpsc;
    use std::time::Duration;

    /// 记录上传调用，可模拟失败或阻塞
    struct RecordingRemote {
        fail: bool,
        gate: Option<Mutex<mpsc::Receiver<()>>>,
        uploads: Mutex<Vec<String>>,
    }

    impl RecordingRemote {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                gate: None,
                uploads: Mutex::new(Vec::new()),
            }
        }

        fn gated(rx: mpsc::Receiver<()>) -> Self {
            Self {
                fail: false,
                gate: Some(Mutex::new(rx)),
                uploads: Mutex::new(Vec::new()),
            }
        }
    }

    impl RemoteStore for RecordingRemote {
        fn upload(&self, local: &Path, remote_name: &str) -> Result<(), TransportError> {
            if let Some(gate) = &self.gate {
                let _ = gate.lock().unwrap().recv_timeout(Duration::from_secs(5));
            }
            assert!(local.exists(), "staging file must exist during transfer");
            self.uploads.lock().unwrap().push(remote_name.to_string());
            if self.fail {
                Err(TransportError::CommandFailed {
                    program: "scp".into(),
                    status: Some(1),
                    stderr: "Connection refused".into(),
                })
            } else {
                Ok(())
            }
        }

        fn oldest_artifact(&self) -> Result<Option<RemoteArtifact>, TransportError> {
            Ok(None)
        }

        fn delete_date(&self, _date_prefix: &str) -> Result<usize, TransportError> {
            Ok(0)
        }
    }

    fn staging_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"lq").unwrap();
        path
    }

    #[test]
    fn test_staging_removed_after_success_and_failure() {
        for fail in [false, true] {
            let dir = tempfile::tempdir().unwrap();
            let remote = Arc::new(RecordingRemote::new(fail));
            let uploader =
                Uploader::new(remote.clone(), 2, 8, UploadFailurePolicy::Discard).unwrap();
            let governor = BackpressureGovernor::new();

            let names: Vec<String> = (0..5).map(|i| format!("2024010{}-000000.0000.jpg", i)).collect();
            for name in &names {
                let path = staging_file(dir.path(), name);
                assert_eq!(
                    uploader.submit(path, name.clone(), &governor),
                    SubmitOutcome::Queued
                );
            }

            let stats_handle = Arc::clone(&uploader.stats);
            uploader.drain();

            for name in &names {
                assert!(!dir.path().join(name).exists());
            }
            let mut uploaded = remote.uploads.lock().unwrap().clone();
            uploaded.sort();
            assert_eq!(uploaded, names);

            let stats = stats_handle.lock().unwrap().clone();
            if fail {
                assert_eq!((stats.uploaded, stats.failed), (0, 5));
            } else {
                assert_eq!((stats.uploaded, stats.failed), (5, 0));
            }
        }
    }

    #[test]
    fn test_keep_policy_retains_failed_staging() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(RecordingRemote::new(true));
        let uploader = Uploader::new(remote, 1, 4, UploadFailurePolicy::Keep).unwrap();
        let path = staging_file(dir.path(), "a.jpg");

        uploader.submit(path.clone(), "a.jpg".into(), &BackpressureGovernor::new());
        uploader.drain();

        assert!(path.exists());
    }

    #[test]
    fn test_throttled_submit_leaves_staging_copy() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(RecordingRemote::new(false));
        let uploader =
            Uploader::new(remote.clone(), 1, 4, UploadFailurePolicy::Discard).unwrap();
        let mut governor = BackpressureGovernor::new();
        for _ in 0..4 {
            governor.record_failure();
        }

        let path = staging_file(dir.path(), "a.jpg");
        assert_eq!(
            uploader.submit(path.clone(), "a.jpg".into(), &governor),
            SubmitOutcome::Throttled
        );
        assert_eq!(uploader.get_stats().throttled, 1);
        assert_eq!(uploader.pending(), 0);
        uploader.drain();

        assert!(remote.uploads.lock().unwrap().is_empty());
        assert!(path.exists());
    }

    #[test]
    fn test_full_queue_reports_backpressure() {
        let dir = tempfile::tempdir().unwrap();
        let (release, gate) = mpsc::channel();
        let remote = Arc::new(RecordingRemote::gated(gate));
        let uploader = Uploader::new(remote, 1, 1, UploadFailurePolicy::Discard).unwrap();
        let governor = BackpressureGovernor::new();

        let mut outcomes = Vec::new();
        for i in 0..6 {
            let name = format!("{}.jpg", i);
            outcomes.push(uploader.submit(staging_file(dir.path(), &name), name, &governor));
        }

        // 一个在传输中，一个在队列中，其余被丢弃
        assert!(outcomes.contains(&SubmitOutcome::QueueFull));
        assert!(uploader.pending() <= 2);
        assert!(uploader.queue_depth() <= 1);
        let dropped = outcomes.iter().filter(|o| **o == SubmitOutcome::QueueFull).count();
        assert_eq!(uploader.get_stats().dropped, dropped as u64);

        for _ in 0..6 {
            let _ = release.send(());
        }
        uploader.drain();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
