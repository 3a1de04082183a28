//! taskboard-core: reconciliation and retention of background-task records.
//!
//! The reporter attached to a task queue sends three independent lifecycle
//! notifications per task (queued, started, executed), best-effort, possibly
//! duplicated and in any order. This crate folds them into one record per
//! task and keeps the record store bounded.
//!
//! - [`reconciler::Reconciler`] applies events as atomic upserts.
//! - [`recovery::sweep_abandoned`] runs once at startup.
//! - [`retention::RetentionEngine`] evicts by age and by count.
//! - [`runner::PeriodicRunner`] drives retention on an interval.
//!
//! Everything is constructed explicitly by the host process and shared by
//! `Arc`; there is no process-wide state.

pub mod error;
pub mod event;
pub mod reconciler;
pub mod record;
pub mod recovery;
pub mod retention;
pub mod runner;
pub mod status;
pub mod store;

pub use error::StoreError;
pub use event::{ExecutedEvent, QueuedEvent, StartedEvent};
pub use reconciler::Reconciler;
pub use record::{SortKey, SortOrder, TaskPage, TaskQuery, TaskRecord};
pub use recovery::{sweep_abandoned, SweepReport};
pub use retention::{Cleanup, CleanupReport, RetentionConfig, RetentionEngine};
pub use runner::PeriodicRunner;
pub use status::TaskStatus;
pub use store::{SqliteStore, TaskStore};
