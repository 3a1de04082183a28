//! Lifecycle notifications emitted by the task reporter.
//!
//! Delivery is best-effort: events may arrive late, twice, or never, and in
//! any order relative to each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn empty_array() -> Value {
    Value::Array(Vec::new())
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// The task was handed to the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedEvent {
    #[serde(alias = "task_name")]
    pub name: String,
    pub worker: String,
    #[serde(default = "empty_array")]
    pub args: Value,
    #[serde(default = "empty_object")]
    pub kwargs: Value,
    #[serde(default = "empty_object")]
    pub labels: Value,
    pub queued_at: DateTime<Utc>,
}

/// A worker picked the task up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartedEvent {
    #[serde(alias = "task_name")]
    pub name: String,
    pub worker: String,
    #[serde(default = "empty_array")]
    pub args: Value,
    #[serde(default = "empty_object")]
    pub kwargs: Value,
    pub started_at: DateTime<Utc>,
}

/// The task finished, successfully or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedEvent {
    pub finished_at: DateTime<Utc>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub return_value: Option<Value>,
}
