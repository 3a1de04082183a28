//! Errors raised by the record store and everything layered on top of it.

use thiserror::Error;

/// All errors that can occur while reading or writing task records.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Propagated from sqlx (connection, query, or transaction failure).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Embedded migrations could not be applied on connect.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A JSON payload column could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored row holds a value the current schema cannot interpret.
    #[error("invalid row {id}: {reason}")]
    InvalidRow { id: String, reason: String },
}

impl StoreError {
    /// `true` when the failure is about storage availability rather than the
    /// data itself, i.e. the same call may succeed if it is delivered again.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(e) => match e {
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
                sqlx::Error::Database(db) => {
                    // SQLITE_BUSY (5) and SQLITE_LOCKED (6), including extended codes.
                    db.code()
                        .and_then(|c| c.parse::<i32>().ok())
                        .map(|c| matches!(c & 0xff, 5 | 6))
                        .unwrap_or(false)
                }
                _ => false,
            },
            StoreError::Migrate(_) | StoreError::Json(_) | StoreError::InvalidRow { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_transient() {
        assert!(StoreError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(StoreError::Database(sqlx::Error::PoolClosed).is_transient());
    }

    #[test]
    fn data_errors_are_not_transient() {
        assert!(!StoreError::Database(sqlx::Error::RowNotFound).is_transient());
        let err = StoreError::InvalidRow {
            id: "t1".to_owned(),
            reason: "unknown status".to_owned(),
        };
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "invalid row t1: unknown status");
    }
}
