//! Record store abstraction.
//!
//! [`TaskStore`] is everything the reconciler, recovery sweep, retention
//! engine and read API need from durable storage. Every method is a single
//! bounded unit of work against the database; nothing is cached in memory
//! between calls. The default implementation is [`sqlite::SqliteStore`].
//!
//! All trait methods use `impl Future` in their signatures so no extra
//! `async-trait` crate is required.

pub mod sqlite;

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::event::{ExecutedEvent, QueuedEvent, StartedEvent};
use crate::record::{TaskPage, TaskQuery, TaskRecord};
use crate::status::TaskStatus;

pub use sqlite::SqliteStore;

pub trait TaskStore: Send + Sync + 'static {
    /// Insert a `queued` row, or refresh only the queued-owned fields
    /// (`name`, `worker`, `args`, `kwargs`, `labels`, `queued_at`) of an
    /// existing one. Never touches `status` or the other timestamps.
    fn upsert_queued(
        &self,
        id: &str,
        event: &QueuedEvent,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert or overwrite as `in_progress`, replacing `name`, `worker`,
    /// `args`, `kwargs` and `started_at`.
    fn upsert_started(
        &self,
        id: &str,
        event: &StartedEvent,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert or overwrite with the execution outcome: `status`, `result`,
    /// `error` and `finished_at`.
    fn upsert_executed(
        &self,
        id: &str,
        event: &ExecutedEvent,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn get_task(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<TaskRecord>, StoreError>> + Send;

    fn find_tasks(
        &self,
        query: &TaskQuery,
    ) -> impl Future<Output = Result<TaskPage, StoreError>> + Send;

    /// Rewrite every row in status `from` to status `to`; returns rows changed.
    fn update_status_bulk(
        &self,
        from: TaskStatus,
        to: TaskStatus,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Remove one row. Returns `false` when no such row existed.
    fn delete_task(&self, id: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Remove every listed row in one statement; unknown ids are skipped.
    /// Returns rows removed.
    fn delete_tasks(&self, ids: &[String]) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Remove every row whose reference timestamp is strictly before `cutoff`.
    /// Rows with no timestamp at all are kept.
    fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Remove the oldest rows (by reference timestamp, then id) until at most
    /// `max_tasks` remain; returns rows removed.
    fn delete_excess(&self, max_tasks: u64) -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn count_tasks(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;
}
