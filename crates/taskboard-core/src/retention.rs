//! Retention: time-to-live and maximum-count eviction of task records.
//!
//! Age is measured on the reference timestamp (`finished_at`, else
//! `started_at`, else `queued_at`). Records that never got past `queued` or
//! `in_progress` are evicted like any other once old enough, so stuck tasks
//! do not survive forever.

use std::future::Future;
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::store::TaskStore;

/// Retention policy. A `None` policy is disabled on its own; `enabled =
/// false` disables both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    pub enabled: bool,
    /// Maximum record age in days.
    pub ttl_days: Option<u32>,
    /// Maximum number of records kept.
    pub max_tasks: Option<u64>,
}

impl RetentionConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ttl_days: None,
            max_tasks: None,
        }
    }
}

/// Rows removed by one cleanup pass, per policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted_by_ttl: u64,
    pub deleted_by_count: u64,
}

impl CleanupReport {
    pub fn total(&self) -> u64 {
        self.deleted_by_ttl + self.deleted_by_count
    }
}

/// A cleanup pass the [`PeriodicRunner`](crate::runner::PeriodicRunner) can drive.
pub trait Cleanup: Send + Sync + 'static {
    fn run_cleanup(&self) -> impl Future<Output = Result<CleanupReport, StoreError>> + Send;
}

#[derive(Debug)]
pub struct RetentionEngine<S> {
    store: Arc<S>,
    config: RetentionConfig,
}

impl<S: TaskStore> RetentionEngine<S> {
    pub fn new(store: Arc<S>, config: RetentionConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Delete every record whose reference timestamp is older than
    /// `now - ttl_days`. Records without any timestamp are kept.
    ///
    /// A TTL reaching past the representable date range deletes nothing.
    pub async fn delete_by_ttl(&self, ttl_days: u32) -> Result<u64, StoreError> {
        let Some(cutoff) = TimeDelta::try_days(i64::from(ttl_days))
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
        else {
            debug!(ttl_days, "ttl reaches past the earliest timestamp; nothing to evict");
            return Ok(0);
        };
        let deleted = self.store.delete_older_than(cutoff).await?;
        debug!(ttl_days, %cutoff, deleted, "ttl eviction finished");
        Ok(deleted)
    }

    /// Delete the oldest records until at most `max_tasks` remain.
    pub async fn delete_by_count(&self, max_tasks: u64) -> Result<u64, StoreError> {
        let deleted = self.store.delete_excess(max_tasks).await?;
        debug!(max_tasks, deleted, "count eviction finished");
        Ok(deleted)
    }
}

impl<S: TaskStore> Cleanup for RetentionEngine<S> {
    /// TTL eviction first, then count eviction.
    async fn run_cleanup(&self) -> Result<CleanupReport, StoreError> {
        if !self.config.enabled {
            return Ok(CleanupReport::default());
        }

        let mut report = CleanupReport::default();
        if let Some(ttl_days) = self.config.ttl_days {
            report.deleted_by_ttl = self.delete_by_ttl(ttl_days).await?;
        }
        if let Some(max_tasks) = self.config.max_tasks {
            report.deleted_by_count = self.delete_by_count(max_tasks).await?;
        }

        info!(
            total = report.total(),
            deleted_by_ttl = report.deleted_by_ttl,
            deleted_by_count = report.deleted_by_count,
            "cleanup completed"
        );
        Ok(report)
    }
}
