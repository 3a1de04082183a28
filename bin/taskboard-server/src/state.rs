//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use taskboard_core::{Reconciler, SqliteStore};

use crate::config::Config;

#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Task record store, shared with the retention engine.
    pub store: Arc<SqliteStore>,
    /// Folds lifecycle events into the store.
    pub reconciler: Reconciler<SqliteStore>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<SqliteStore>) -> Self {
        Self {
            config: Arc::new(config),
            reconciler: Reconciler::new(Arc::clone(&store)),
            store,
        }
    }
}
