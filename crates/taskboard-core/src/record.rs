//! The task record and the read-side query types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::status::TaskStatus;

/// Latest known state of one tracked task; a row in the `tasks` table.
///
/// Any subset of the three lifecycle timestamps may be populated, since any
/// of the corresponding events may never arrive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub name: String,
    pub status: TaskStatus,
    pub worker: String,
    pub args: Value,
    pub kwargs: Value,
    pub labels: Value,
    /// Serialized return value; only written by a successful executed event.
    pub result: Option<Value>,
    /// Failure description; only written by a failed executed event.
    pub error: Option<String>,
    pub queued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Timestamp used for age comparisons: finished, else started, else queued.
    pub fn reference_timestamp(&self) -> Option<DateTime<Utc>> {
        self.finished_at.or(self.started_at).or(self.queued_at)
    }
}

/// Column a task listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    StartedAt,
    FinishedAt,
}

impl SortKey {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            SortKey::StartedAt => "started_at",
            SortKey::FinishedAt => "finished_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub(crate) fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filter, ordering and pagination for a task listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    /// Case-insensitive substring match on the task name.
    pub name: Option<String>,
    pub sort_by: Option<SortKey>,
    pub sort_order: SortOrder,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl TaskQuery {
    pub const DEFAULT_PAGE_SIZE: u32 = 30;
    pub const MAX_PAGE_SIZE: u32 = 500;

    pub(crate) fn limit(&self) -> i64 {
        i64::from(self.page_size.clamp(1, Self::MAX_PAGE_SIZE))
    }

    pub(crate) fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * self.limit()
    }

    /// Trimmed name filter, or `None` when too short to be meaningful.
    pub(crate) fn name_filter(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| n.chars().count() > 1)
    }
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self {
            status: None,
            name: None,
            sort_by: None,
            sort_order: SortOrder::default(),
            page: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of a task listing plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskPage {
    pub items: Vec<TaskRecord>,
    pub total: u64,
}
