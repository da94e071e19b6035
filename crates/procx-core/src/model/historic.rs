//! Historic records rebuilt by the async history pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoricTaskInstance {
    pub id: String,
    #[serde(default)]
    pub revision: i64,
    pub process_definition_id: Option<String>,
    pub process_instance_id: Option<String>,
    pub execution_id: Option<String>,
    pub name: Option<String>,
    pub parent_task_id: Option<String>,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub assignee: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start_time: Option<DateTime<Utc>>,
    pub task_definition_key: Option<String>,
    pub priority: Option<i32>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub due_date: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub form_key: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub claim_time: Option<DateTime<Utc>>,
    pub tenant_id: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub end_time: Option<DateTime<Utc>>,
    pub delete_reason: Option<String>,
    pub duration_in_millis: Option<i64>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_updated_time: Option<DateTime<Utc>>,
}

impl HistoricTaskInstance {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoricActivityInstance {
    pub id: String,
    #[serde(default)]
    pub revision: i64,
    pub process_definition_id: Option<String>,
    pub process_instance_id: Option<String>,
    pub execution_id: Option<String>,
    pub activity_id: Option<String>,
    pub activity_name: Option<String>,
    pub activity_type: Option<String>,
    /// Task created by this activity, backfilled from task history
    pub task_id: Option<String>,
    pub tenant_id: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub end_time: Option<DateTime<Utc>>,
    pub delete_reason: Option<String>,
    pub duration_in_millis: Option<i64>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_updated_time: Option<DateTime<Utc>>,
}

impl HistoricActivityInstance {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }
}

/// Milliseconds between `start` and `end`, when both are known
pub(crate) fn duration_between(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Option<i64> {
    match (start, end) {
        (Some(s), Some(e)) => Some((e - s).num_milliseconds()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_duration_requires_both_ends() {
        let s = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        let e = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 5).unwrap();
        assert_eq!(duration_between(Some(s), Some(e)), Some(5_000));
        assert_eq!(duration_between(None, Some(e)), None);
        assert_eq!(duration_between(Some(s), None), None);
    }
}
