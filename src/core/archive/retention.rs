use std::sync::Arc;

use chrono::{Local, NaiveDate};
use log::{info, warn};

use super::artifact;
use super::governor::BackpressureGovernor;
use crate::core::error::{ArchiveError, ArchiveResult};
use crate::core::remote::RemoteStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetentionOutcome {
    /// Oldest artifact is still inside the window.
    Kept { oldest: String, age_days: i64 },
    /// Every artifact of `date` was removed.
    Purged {
        date: String,
        age_days: i64,
        removed: usize,
    },
}

/// Keeps the remote store to the last `retention_days + 1` capture dates.
///
/// Each run purges at most one date, the oldest one, so a backlog of stale
/// dates drains one date per run.
pub struct RetentionEnforcer {
    remote: Arc<dyn RemoteStore>,
    retention_days: i64,
}

impl RetentionEnforcer {
    pub const DEFAULT_RETENTION_DAYS: i64 = 2;

    pub fn new(remote: Arc<dyn RemoteStore>, retention_days: i64) -> Self {
        Self {
            remote,
            retention_days,
        }
    }

    pub fn enforce(&self, governor: &mut BackpressureGovernor) -> ArchiveResult<RetentionOutcome> {
        self.enforce_on(Local::now().date_naive(), governor)
    }

    /// Run one enforcement pass as of `today`, feeding the outcome to `governor`.
    pub fn enforce_on(
        &self,
        today: NaiveDate,
        governor: &mut BackpressureGovernor,
    ) -> ArchiveResult<RetentionOutcome> {
        info!("🧹 Checking remote store for expired images");
        match self.check(today) {
            Ok(outcome) => {
                governor.record_success();
                Ok(outcome)
            }
            Err(e) => {
                governor.record_failure();
                warn!(
                    "⚠️ Retention check failed ({} in a row): {}",
                    governor.failure_count(),
                    e
                );
                Err(e)
            }
        }
    }

    fn check(&self, today: NaiveDate) -> ArchiveResult<RetentionOutcome> {
        let oldest = self
            .remote
            .oldest_artifact()?
            .ok_or(ArchiveError::EmptyRemote)?;
        let date = Some(oldest.name.as_str())
            .filter(|name| artifact::is_artifact_name(name))
            .and_then(artifact::artifact_date)
            .ok_or_else(|| ArchiveError::InvalidArtifactDate(oldest.name.clone()))?;
        let age_days = (today - date).num_days();
        info!(
            "  oldest remote image is {} (date {}, {} days old)",
            oldest.name, date, age_days
        );

        if age_days <= self.retention_days {
            return Ok(RetentionOutcome::Kept {
                oldest: oldest.name,
                age_days,
            });
        }

        let prefix = date.format("%Y%m%d").to_string();
        let removed = self.remote.delete_date(&prefix)?;
        info!("  deleted {} images dated {}", removed, prefix);
        Ok(RetentionOutcome::Purged {
            date: prefix,
            age_days,
            removed,
        })
    }
}
