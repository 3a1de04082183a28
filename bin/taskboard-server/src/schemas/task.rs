use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskboard_core::{SortKey, SortOrder, TaskPage, TaskQuery, TaskRecord, TaskStatus};
use utoipa::{IntoParams, ToSchema};

use crate::error::ServerError;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListTasksQuery {
    /// One of `queued`, `in_progress`, `completed`, `failure`, `abandoned`.
    pub status: Option<String>,
    /// Case-insensitive substring of the task name.
    pub name: Option<String>,
    /// `started_at` or `finished_at`.
    pub sort_by: Option<String>,
    /// `asc` or `desc` (default).
    pub sort_order: Option<String>,
    /// 1-based page number.
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl TryFrom<ListTasksQuery> for TaskQuery {
    type Error = ServerError;

    fn try_from(q: ListTasksQuery) -> Result<Self, Self::Error> {
        let status = q
            .status
            .as_deref()
            .map(|s| {
                TaskStatus::from_str(s)
                    .map_err(|_| ServerError::BadRequest(format!("unknown status '{s}'")))
            })
            .transpose()?;

        let sort_by = match q.sort_by.as_deref() {
            None => None,
            Some("started_at") => Some(SortKey::StartedAt),
            Some("finished_at") => Some(SortKey::FinishedAt),
            Some(other) => {
                return Err(ServerError::BadRequest(format!(
                    "cannot sort by '{other}'"
                )));
            }
        };

        let sort_order = match q.sort_order.as_deref() {
            None => SortOrder::default(),
            Some(o) if o.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            Some(o) if o.eq_ignore_ascii_case("desc") => SortOrder::Desc,
            Some(other) => {
                return Err(ServerError::BadRequest(format!(
                    "unknown sort order '{other}'"
                )));
            }
        };

        let page_size = q.page_size.unwrap_or(TaskQuery::DEFAULT_PAGE_SIZE);
        if page_size == 0 || page_size > TaskQuery::MAX_PAGE_SIZE {
            return Err(ServerError::BadRequest(format!(
                "page_size must be between 1 and {}",
                TaskQuery::MAX_PAGE_SIZE
            )));
        }

        Ok(TaskQuery {
            status,
            name: q.name,
            sort_by,
            sort_order,
            page: q.page.unwrap_or(1).max(1),
            page_size,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskResponse {
    pub id: String,
    pub name: String,
    pub status: String,
    pub worker: String,
    #[schema(value_type = Object)]
    pub args: Value,
    #[schema(value_type = Object)]
    pub kwargs: Value,
    #[schema(value_type = Object)]
    pub labels: Value,
    #[schema(value_type = Option<Object>)]
    pub result: Option<Value>,
    pub error: Option<String>,
    pub queued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<TaskRecord> for TaskResponse {
    fn from(r: TaskRecord) -> Self {
        Self {
            id: r.id,
            name: r.name,
            status: r.status.as_str().to_owned(),
            worker: r.worker,
            args: r.args,
            kwargs: r.kwargs,
            labels: r.labels,
            result: r.result,
            error: r.error,
            queued_at: r.queued_at,
            started_at: r.started_at,
            finished_at: r.finished_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskPageResponse {
    pub items: Vec<TaskResponse>,
    pub total: u64,
}

impl From<TaskPage> for TaskPageResponse {
    fn from(page: TaskPage) -> Self {
        Self {
            items: page.items.into_iter().map(TaskResponse::from).collect(),
            total: page.total,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkDeleteRequest {
    pub task_ids: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkDeleteResponse {
    /// Rows actually removed; ids that did not exist are not counted.
    pub deleted: u64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_query_uses_defaults() {
        let q = TaskQuery::try_from(ListTasksQuery::default()).unwrap();
        assert_eq!(q, TaskQuery::default());
    }

    #[test]
    fn query_strings_parse_into_typed_values() {
        let q = TaskQuery::try_from(ListTasksQuery {
            status: Some("in_progress".into()),
            sort_by: Some("finished_at".into()),
            sort_order: Some("ASC".into()),
            page: Some(0),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(q.status, Some(TaskStatus::InProgress));
        assert_eq!(q.sort_by, Some(SortKey::FinishedAt));
        assert_eq!(q.sort_order, SortOrder::Asc);
        assert_eq!(q.page, 1);
    }

    #[test]
    fn unknown_values_are_rejected() {
        for bad in [
            ListTasksQuery {
                status: Some("running".into()),
                ..Default::default()
            },
            ListTasksQuery {
                sort_by: Some("queued_at".into()),
                ..Default::default()
            },
            ListTasksQuery {
                page_size: Some(501),
                ..Default::default()
            },
        ] {
            assert!(matches!(
                TaskQuery::try_from(bad),
                Err(ServerError::BadRequest(_))
            ));
        }
    }
}
