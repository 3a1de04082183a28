//! Merges lifecycle events into task records.
//!
//! Each operation is one atomic upsert against the store. There is no
//! ordering logic: the write the database observes last wins, so a started
//! event applied after an executed event moves the record back to
//! `in_progress`. The only protection is that a queued event never rewrites
//! `status` of a record that already exists. No retries happen here; a
//! failed write is returned to the caller, and redelivery is the reporter's
//! job.

use std::sync::Arc;

use tracing::debug;

use crate::error::StoreError;
use crate::event::{ExecutedEvent, QueuedEvent, StartedEvent};
use crate::status::TaskStatus;
use crate::store::TaskStore;

#[derive(Debug)]
pub struct Reconciler<S> {
    store: Arc<S>,
}

impl<S> Clone for Reconciler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: TaskStore> Reconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn apply_queued(&self, id: &str, event: &QueuedEvent) -> Result<(), StoreError> {
        self.store.upsert_queued(id, event).await?;
        debug!(task_id = %id, name = %event.name, worker = %event.worker, "applied queued event");
        Ok(())
    }

    pub async fn apply_started(&self, id: &str, event: &StartedEvent) -> Result<(), StoreError> {
        self.store.upsert_started(id, event).await?;
        debug!(task_id = %id, name = %event.name, worker = %event.worker, "applied started event");
        Ok(())
    }

    pub async fn apply_executed(&self, id: &str, event: &ExecutedEvent) -> Result<(), StoreError> {
        self.store.upsert_executed(id, event).await?;
        debug!(
            task_id = %id,
            status = %TaskStatus::from_error(event.error.as_deref()),
            "applied executed event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TaskRecord;
    use crate::store::SqliteStore;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    async fn setup() -> (Reconciler<SqliteStore>, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
        (Reconciler::new(Arc::clone(&store)), store)
    }

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap()
    }

    fn queued() -> QueuedEvent {
        QueuedEvent {
            name: "reports.build".to_owned(),
            worker: "broker".to_owned(),
            args: json!([1, 2, 3]),
            kwargs: json!({"key": "value"}),
            labels: json!({"tenant": "acme"}),
            queued_at: ts(0),
        }
    }

    fn started() -> StartedEvent {
        StartedEvent {
            name: "reports.build".to_owned(),
            worker: "worker-07".to_owned(),
            args: json!([1, 2, 3]),
            kwargs: json!({"key": "value"}),
            started_at: ts(1),
        }
    }

    fn succeeded() -> ExecutedEvent {
        ExecutedEvent {
            finished_at: ts(2),
            error: None,
            return_value: Some(json!({"pages": 12})),
        }
    }

    fn failed() -> ExecutedEvent {
        ExecutedEvent {
            finished_at: ts(2),
            error: Some("TimeoutError".to_owned()),
            return_value: None,
        }
    }

    async fn load(store: &SqliteStore, id: &str) -> TaskRecord {
        store.get_task(id).await.unwrap().expect("record should exist")
    }

    #[tokio::test]
    async fn in_order_lifecycle_reaches_completed() {
        let (reconciler, store) = setup().await;

        reconciler.apply_queued("t1", &queued()).await.unwrap();
        let record = load(&store, "t1").await;
        assert_eq!(record.status, TaskStatus::Queued);

        reconciler.apply_started("t1", &started()).await.unwrap();
        let record = load(&store, "t1").await;
        assert_eq!(record.status, TaskStatus::InProgress);
        assert_eq!(record.queued_at, Some(ts(0)));
        assert_eq!(record.worker, "worker-07");

        reconciler.apply_executed("t1", &succeeded()).await.unwrap();
        let record = load(&store, "t1").await;
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.result, Some(json!({"pages": 12})));
        assert_eq!(record.error, None);
        assert_eq!(record.queued_at, Some(ts(0)));
        assert_eq!(record.started_at, Some(ts(1)));
        assert_eq!(record.finished_at, Some(ts(2)));
        assert_eq!(record.labels, json!({"tenant": "acme"}));
    }

    #[tokio::test]
    async fn in_order_lifecycle_with_error_reaches_failure() {
        let (reconciler, store) = setup().await;
        reconciler.apply_queued("t1", &queued()).await.unwrap();
        reconciler.apply_started("t1", &started()).await.unwrap();
        reconciler.apply_executed("t1", &failed()).await.unwrap();

        let record = load(&store, "t1").await;
        assert_eq!(record.status, TaskStatus::Failure);
        assert_eq!(record.error.as_deref(), Some("TimeoutError"));
        assert_eq!(record.result, None);
        assert!(record.queued_at.is_some() && record.started_at.is_some() && record.finished_at.is_some());
    }

    #[tokio::test]
    async fn executed_first_creates_record_without_earlier_timestamps() {
        let (reconciler, store) = setup().await;
        reconciler.apply_executed("t1", &succeeded()).await.unwrap();

        let record = load(&store, "t1").await;
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.queued_at, None);
        assert_eq!(record.started_at, None);
        assert_eq!(record.finished_at, Some(ts(2)));
    }

    #[tokio::test]
    async fn started_after_executed_regresses_to_in_progress() {
        let (reconciler, store) = setup().await;
        reconciler.apply_executed("t1", &succeeded()).await.unwrap();
        reconciler.apply_started("t1", &started()).await.unwrap();

        // Last write wins: the result stays, the status goes back.
        let record = load(&store, "t1").await;
        assert_eq!(record.status, TaskStatus::InProgress);
        assert_eq!(record.result, Some(json!({"pages": 12})));
        assert_eq!(record.finished_at, Some(ts(2)));
        assert_eq!(record.started_at, Some(ts(1)));
    }

    #[tokio::test]
    async fn late_queued_never_changes_status_or_other_timestamps() {
        let (reconciler, store) = setup().await;
        reconciler.apply_started("t1", &started()).await.unwrap();
        reconciler.apply_executed("t1", &failed()).await.unwrap();
        reconciler.apply_queued("t1", &queued()).await.unwrap();

        let record = load(&store, "t1").await;
        assert_eq!(record.status, TaskStatus::Failure);
        assert_eq!(record.started_at, Some(ts(1)));
        assert_eq!(record.finished_at, Some(ts(2)));
        assert_eq!(record.queued_at, Some(ts(0)));
        assert_eq!(record.worker, "broker");
        assert_eq!(record.labels, json!({"tenant": "acme"}));
    }

    #[tokio::test]
    async fn late_queued_after_started_keeps_in_progress() {
        let (reconciler, store) = setup().await;
        reconciler.apply_started("t1", &started()).await.unwrap();
        reconciler.apply_queued("t1", &queued()).await.unwrap();

        let record = load(&store, "t1").await;
        assert_eq!(record.status, TaskStatus::InProgress);
        assert_eq!(record.started_at, Some(ts(1)));
        assert_eq!(record.queued_at, Some(ts(0)));
    }

    #[tokio::test]
    async fn redelivered_events_are_idempotent() {
        let (reconciler, store) = setup().await;
        for _ in 0..2 {
            reconciler.apply_queued("t1", &queued()).await.unwrap();
            reconciler.apply_started("t1", &started()).await.unwrap();
            reconciler.apply_executed("t1", &succeeded()).await.unwrap();
        }
        let once = load(&store, "t1").await;
        reconciler.apply_executed("t1", &succeeded()).await.unwrap();
        assert_eq!(load(&store, "t1").await, once);
        assert_eq!(store.count_tasks().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn abandoned_record_is_overwritten_by_live_event() {
        let (reconciler, store) = setup().await;
        reconciler.apply_started("t1", &started()).await.unwrap();
        store
            .update_status_bulk(TaskStatus::InProgress, TaskStatus::Abandoned)
            .await
            .unwrap();
        reconciler.apply_executed("t1", &succeeded()).await.unwrap();

        assert_eq!(load(&store, "t1").await.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn concurrent_events_for_distinct_ids_all_land() {
        let (reconciler, store) = setup().await;
        let calls = (0..20).map(|i| {
            let reconciler = reconciler.clone();
            async move {
                let id = format!("t{i}");
                reconciler.apply_started(&id, &started()).await.unwrap();
                reconciler.apply_executed(&id, &succeeded()).await.unwrap();
            }
        });
        futures::future::join_all(calls).await;

        assert_eq!(store.count_tasks().await.unwrap(), 20);
        assert_eq!(load(&store, "t13").await.status, TaskStatus::Completed);
    }
}
