//! Startup recovery: records left `queued` or `in_progress` by a previous
//! process lifetime are marked `abandoned`, since the events that would have
//! moved them forward may have been lost while the process was down.
//!
//! The rewrite has no age threshold and is one bulk `UPDATE` per status. It
//! must run before new events are accepted; a live event arriving later can
//! still overwrite an abandoned record.

use tracing::info;

use crate::error::StoreError;
use crate::status::TaskStatus;
use crate::store::TaskStore;

/// Rows rewritten by [`sweep_abandoned`], per original status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub in_progress: u64,
    pub queued: u64,
}

impl SweepReport {
    pub fn total(&self) -> u64 {
        self.in_progress + self.queued
    }
}

pub async fn sweep_abandoned<S: TaskStore>(store: &S) -> Result<SweepReport, StoreError> {
    let mut report = SweepReport::default();
    for status in TaskStatus::IN_FLIGHT {
        let changed = store
            .update_status_bulk(status, TaskStatus::Abandoned)
            .await?;
        match status {
            TaskStatus::InProgress => report.in_progress = changed,
            _ => report.queued = changed,
        }
    }
    info!(
        in_progress = report.in_progress,
        queued = report.queued,
        "marked in-flight tasks from previous run as abandoned"
    );
    Ok(report)
}
