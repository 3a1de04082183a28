use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Lifecycle status of a tracked task.
///
/// The intended path is `queued → in_progress → completed | failure`, with
/// `abandoned` assigned only by the startup recovery sweep. Nothing enforces
/// that path: every lifecycle event writes its own status regardless of what
/// is currently stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    InProgress,
    Completed,
    Failure,
    Abandoned,
}

impl TaskStatus {
    /// Statuses the recovery sweep rewrites to [`TaskStatus::Abandoned`].
    pub const IN_FLIGHT: [TaskStatus; 2] = [TaskStatus::InProgress, TaskStatus::Queued];

    /// Storage / wire spelling.
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failure | TaskStatus::Abandoned
        )
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, TaskStatus::Queued | TaskStatus::InProgress)
    }

    /// Outcome status of an executed event: any non-empty error is a failure.
    pub fn from_error(error: Option<&str>) -> Self {
        match error {
            Some(e) if !e.is_empty() => TaskStatus::Failure,
            _ => TaskStatus::Completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TaskStatus; 5] = [
        TaskStatus::Queued,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Failure,
        TaskStatus::Abandoned,
    ];

    #[test]
    fn display_parse_and_as_str_agree() {
        for status in ALL {
            assert_eq!(status.to_string(), status.as_str());
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::Value::from(status.as_str())
            );
        }
        assert!("running".parse::<TaskStatus>().is_err());
        assert_eq!(TaskStatus::InProgress.as_str(), "in_progress");
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let back: TaskStatus = serde_json::from_str("\"abandoned\"").unwrap();
        assert_eq!(back, TaskStatus::Abandoned);
    }

    #[test]
    fn terminal_and_in_flight_partition_the_set() {
        for status in ALL {
            assert_ne!(status.is_terminal(), status.is_in_flight(), "{status}");
        }
        for status in TaskStatus::IN_FLIGHT {
            assert!(status.is_in_flight());
        }
    }

    #[test]
    fn executed_outcome_depends_on_error_text() {
        assert_eq!(TaskStatus::from_error(None), TaskStatus::Completed);
        assert_eq!(TaskStatus::from_error(Some("")), TaskStatus::Completed);
        assert_eq!(TaskStatus::from_error(Some("boom")), TaskStatus::Failure);
    }
}
