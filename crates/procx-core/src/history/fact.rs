//! History facts: the JSON payload of history jobs
//!
//! Every fact is a JSON object with a `type` discriminant and a `timestamp`.
//! Unknown fields are ignored so older consumers accept newer producers.

use crate::errors::{ProcxError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TYPE_FIELD: &str = "type";

pub const TASK_CREATED: &str = "task-created";
pub const TASK_ENDED: &str = "task-ended";
pub const ACTIVITY_START: &str = "activity-start";
pub const ACTIVITY_END: &str = "activity-end";

/// Fields of the `task-created` and `task-ended` facts
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFact {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub execution_id: Option<String>,
    pub activity_id: Option<String>,
    pub process_definition_id: Option<String>,
    pub process_instance_id: Option<String>,
    pub name: Option<String>,
    pub parent_task_id: Option<String>,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub assignee: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub task_definition_key: Option<String>,
    pub priority: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub form_key: Option<String>,
    pub claim_time: Option<DateTime<Utc>>,
    pub tenant_id: Option<String>,
    pub end_time: Option<DateTime<Utc>>,
    pub delete_reason: Option<String>,
}

/// Fields of the `activity-start` and `activity-end` facts
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFact {
    /// Activity instance id; absent on end facts
    pub id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub execution_id: String,
    pub activity_id: String,
    pub activity_name: Option<String>,
    pub activity_type: Option<String>,
    pub process_definition_id: Option<String>,
    pub process_instance_id: Option<String>,
    pub tenant_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub delete_reason: Option<String>,
}

/// The `type` discriminant of a fact document
pub fn fact_type(fact: &Value) -> Result<&str> {
    fact.get(TYPE_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| ProcxError::InvalidHistoryFact {
            message: format!("missing '{}' discriminant", TYPE_FIELD),
        })
}

pub fn parse_fact<T: DeserializeOwned>(fact: &Value) -> Result<T> {
    T::deserialize(fact).map_err(|e| ProcxError::InvalidHistoryFact {
        message: e.to_string(),
    })
}

/// Serialize `fact` and tag it with `fact_type`
pub fn fact_document<T: Serialize>(fact_type: &str, fact: &T) -> Result<Value> {
    let mut doc = serde_json::to_value(fact)?;
    match doc.as_object_mut() {
        Some(map) => {
            map.insert(TYPE_FIELD.to_string(), Value::String(fact_type.to_string()));
            Ok(doc)
        }
        None => Err(ProcxError::InvalidHistoryFact {
            message: "fact must serialize to a JSON object".to_string(),
        }),
    }
}
