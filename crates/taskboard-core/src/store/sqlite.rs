//! SQLite implementation of [`TaskStore`].
//!
//! Uses [`sqlx`] with the `sqlite` feature. Migrations are run automatically
//! on startup via [`SqliteStore::connect`].
//!
//! # Migrations path
//!
//! `sqlx::migrate!("./migrations")` resolves the path **at compile time**
//! relative to `CARGO_MANIFEST_DIR`, so the directory is embedded into the
//! binary. The database location is chosen at runtime by the caller.
//!
//! # Timestamps
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC text
//! (`2024-05-01T10:00:00.000000Z`), so string comparison in SQL is
//! chronological comparison. The reference timestamp used by retention is
//! `COALESCE(finished_at, started_at, queued_at)`.
//!
//! # Queries
//!
//! The `sqlx::query` (runtime-verified) form is used so that no
//! `DATABASE_URL` environment variable is needed at compile time.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::TaskStore;
use crate::error::StoreError;
use crate::event::{ExecutedEvent, QueuedEvent, StartedEvent};
use crate::record::{TaskPage, TaskQuery, TaskRecord};
use crate::status::TaskStatus;

const SELECT_COLUMNS: &str = "SELECT id, name, status, worker, args, kwargs, labels, result, error, \
     queued_at, started_at, finished_at FROM tasks";

const REFERENCE_TS: &str = "COALESCE(finished_at, started_at, queued_at)";

/// SQLite-backed task record store.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g.
    /// `"sqlite://taskboard.db"` or `"sqlite::memory:"` for tests. An
    /// in-memory database lives on a single pinned connection, since every
    /// new connection would otherwise see an empty database.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        let pool = if is_memory_url(url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .connect_with(
                    options
                        .journal_mode(SqliteJournalMode::Wal)
                        .busy_timeout(Duration::from_secs(5)),
                )
                .await?
        };

        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

pub(crate) fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn encode_json(value: &serde_json::Value) -> Result<String, StoreError> {
    Ok(serde_json::to_string(value)?)
}

/// Escape `%`, `_` and the escape character itself for a `LIKE … ESCAPE '\'`.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &TaskQuery) {
    qb.push(" WHERE 1 = 1");
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(name) = query.name_filter() {
        qb.push(" AND name LIKE ")
            .push_bind(format!("%{}%", escape_like(name)))
            .push(" ESCAPE '\\'");
    }
}

// ── Row mapping ───────────────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    name: String,
    status: String,
    worker: String,
    args: String,
    kwargs: String,
    labels: String,
    result: Option<String>,
    error: Option<String>,
    queued_at: Option<String>,
    started_at: Option<String>,
    finished_at: Option<String>,
}

impl TryFrom<TaskRow> for TaskRecord {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<TaskStatus>()
            .map_err(|_| StoreError::InvalidRow {
                id: row.id.clone(),
                reason: format!("unknown status '{}'", row.status),
            })?;
        let queued_at = decode_ts(&row.id, "queued_at", row.queued_at)?;
        let started_at = decode_ts(&row.id, "started_at", row.started_at)?;
        let finished_at = decode_ts(&row.id, "finished_at", row.finished_at)?;
        Ok(TaskRecord {
            status,
            name: row.name,
            worker: row.worker,
            args: serde_json::from_str(&row.args)?,
            kwargs: serde_json::from_str(&row.kwargs)?,
            labels: serde_json::from_str(&row.labels)?,
            result: row.result.as_deref().map(serde_json::from_str).transpose()?,
            error: row.error,
            queued_at,
            started_at,
            finished_at,
            id: row.id,
        })
    }
}

fn decode_ts(
    id: &str,
    column: &str,
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| StoreError::InvalidRow {
                id: id.to_owned(),
                reason: format!("{column} '{raw}' is not an RFC 3339 timestamp: {e}"),
            })
    })
    .transpose()
}

// ── TaskStore ─────────────────────────────────────────────────────────────────

impl TaskStore for SqliteStore {
    async fn upsert_queued(&self, id: &str, event: &QueuedEvent) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tasks (id, name, status, worker, args, kwargs, labels, queued_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT(id) DO UPDATE SET \
                name = excluded.name, worker = excluded.worker, args = excluded.args, \
                kwargs = excluded.kwargs, labels = excluded.labels, queued_at = excluded.queued_at",
        )
        .bind(id)
        .bind(&event.name)
        .bind(TaskStatus::Queued.as_str())
        .bind(&event.worker)
        .bind(encode_json(&event.args)?)
        .bind(encode_json(&event.kwargs)?)
        .bind(encode_json(&event.labels)?)
        .bind(encode_ts(&event.queued_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_started(&self, id: &str, event: &StartedEvent) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tasks (id, name, status, worker, args, kwargs, started_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(id) DO UPDATE SET \
                status = excluded.status, name = excluded.name, worker = excluded.worker, \
                args = excluded.args, kwargs = excluded.kwargs, started_at = excluded.started_at",
        )
        .bind(id)
        .bind(&event.name)
        .bind(TaskStatus::InProgress.as_str())
        .bind(&event.worker)
        .bind(encode_json(&event.args)?)
        .bind(encode_json(&event.kwargs)?)
        .bind(encode_ts(&event.started_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_executed(&self, id: &str, event: &ExecutedEvent) -> Result<(), StoreError> {
        let status = TaskStatus::from_error(event.error.as_deref());
        let (result, error) = match status {
            TaskStatus::Failure => (None, event.error.as_deref()),
            _ => (
                event.return_value.as_ref().map(encode_json).transpose()?,
                None,
            ),
        };
        sqlx::query(
            "INSERT INTO tasks (id, status, result, error, finished_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(id) DO UPDATE SET \
                status = excluded.status, result = excluded.result, \
                error = excluded.error, finished_at = excluded.finished_at",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(result)
        .bind(error)
        .bind(encode_ts(&event.finished_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_task(&self, id: &str) -> Result<Option<TaskRecord>, StoreError> {
        let row: Option<TaskRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TaskRecord::try_from).transpose()
    }

    async fn find_tasks(&self, query: &TaskQuery) -> Result<TaskPage, StoreError> {
        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM tasks");
        push_filters(&mut count_qb, query);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        push_filters(&mut qb, query);
        match query.sort_by {
            Some(key) => {
                qb.push(format!(
                    " ORDER BY {} {} NULLS LAST, id ASC",
                    key.column(),
                    query.sort_order.keyword()
                ));
            }
            None => {
                qb.push(" ORDER BY id ASC");
            }
        }
        qb.push(" LIMIT ")
            .push_bind(query.limit())
            .push(" OFFSET ")
            .push_bind(query.offset());

        let rows: Vec<TaskRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        let items = rows
            .into_iter()
            .map(TaskRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TaskPage {
            items,
            total: total.max(0) as u64,
        })
    }

    async fn update_status_bulk(&self, from: TaskStatus, to: TaskStatus) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE tasks SET status = ?1 WHERE status = ?2")
            .bind(to.as_str())
            .bind(from.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_task(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_tasks(&self, ids: &[String]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM tasks WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(&format!("DELETE FROM tasks WHERE {REFERENCE_TS} < ?1"))
            .bind(encode_ts(&cutoff))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_excess(&self, max_tasks: u64) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
            .fetch_one(&mut *tx)
            .await?;
        if total.max(0) as u64 <= max_tasks {
            return Ok(0);
        }

        // Rank newest-first and drop everything past the budget in one
        // statement; rows without any timestamp rank as newest.
        let keep = i64::try_from(max_tasks).unwrap_or(i64::MAX);
        let result = sqlx::query(&format!(
            "DELETE FROM tasks WHERE id IN ( \
                SELECT id FROM ( \
                    SELECT id, ROW_NUMBER() OVER ( \
                        ORDER BY {REFERENCE_TS} IS NULL DESC, {REFERENCE_TS} DESC, id DESC \
                    ) AS rn \
                    FROM tasks \
                ) WHERE rn > ?1 \
             )"
        ))
        .bind(keep)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn count_tasks(&self) -> Result<u64, StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
            .fetch_one(&self.pool)
            .await?;
        Ok(total.max(0) as u64)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
