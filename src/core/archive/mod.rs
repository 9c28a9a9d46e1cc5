//! 采集归档 - 运动判定、双档存储、上传与远端保留
//!
//! 流程：
//! 1. 直方图相关性评分 - 与上一帧比较
//! 2. 调度器 - 运动触发或周期自动保存
//! 3. 双档写入 - 本地高质量 + 待上传低质量
//! 4. 上传线程池 - 有界队列，失败不重试
//! 5. 远端保留 - 每次最多清理一天，失败计数驱动背压

pub mod artifact;
pub mod governor;
pub mod pipeline;
pub mod retention;
pub mod scheduler;
pub mod uploader;
pub mod writer;

pub use governor::BackpressureGovernor;
pub use pipeline::{ArchivePipeline, PipelineStats, SaveResult, TickReport};
pub use retention::{RetentionEnforcer, RetentionOutcome};
pub use scheduler::{ArchivalScheduler, SaveReason, SchedulerConfig, TickAction, TickPlan};
pub use uploader::{SubmitOutcome, UploadStats, Uploader};
pub use writer::{ArtifactPaths, DualTierWriter};
