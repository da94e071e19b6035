use super::ByteArrayRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Executable job, acquired by the async executor
    Async,
    /// Waits for its due date, then becomes an `Async` job
    Timer,
    /// Parked until its process instance is activated again
    Suspended,
    /// Retries exhausted; kept with its exception until deleted
    DeadLetter,
    /// Async history payload, acquired by the history executor
    History,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Async => "async",
            JobKind::Timer => "timer",
            JobKind::Suspended => "suspended",
            JobKind::DeadLetter => "dead_letter",
            JobKind::History => "history",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "async" => Ok(JobKind::Async),
            "timer" => Ok(JobKind::Timer),
            "suspended" => Ok(JobKind::Suspended),
            "dead_letter" => Ok(JobKind::DeadLetter),
            "history" => Ok(JobKind::History),
            other => Err(format!("unknown job kind: {}", other)),
        }
    }
}

/// A persisted, deferred unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub revision: i64,
    pub kind: JobKind,
    pub execution_id: Option<String>,
    pub process_instance_id: Option<String>,
    pub process_definition_id: Option<String>,
    pub element_id: Option<String>,
    pub element_name: Option<String>,
    pub handler_type: String,
    pub handler_configuration: Option<String>,
    /// Extended handler configuration
    pub custom_values: Option<ByteArrayRef>,
    /// Stack trace / detail of the last failure
    pub exception: Option<ByteArrayRef>,
    pub exception_message: Option<String>,
    pub tenant_id: Option<String>,
    pub deployment_id: Option<String>,
    pub exclusive: bool,
    pub retries: i32,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub due_date: Option<DateTime<Utc>>,
    pub lock_owner: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub lock_expiration_time: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub create_time: Option<DateTime<Utc>>,
    /// Repeat expression of a timer, e.g. `R3/PT10M`
    pub repeat: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub end_date: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(id: impl Into<String>, kind: JobKind, handler_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            revision: 0,
            kind,
            execution_id: None,
            process_instance_id: None,
            process_definition_id: None,
            element_id: None,
            element_name: None,
            handler_type: handler_type.into(),
            handler_configuration: None,
            custom_values: None,
            exception: None,
            exception_message: None,
            tenant_id: None,
            deployment_id: None,
            exclusive: true,
            retries: 3,
            due_date: None,
            lock_owner: None,
            lock_expiration_time: None,
            create_time: None,
            repeat: None,
            end_date: None,
        }
    }

    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = Some(execution_id.into());
        self
    }

    pub fn with_process_instance_id(mut self, process_instance_id: impl Into<String>) -> Self {
        self.process_instance_id = Some(process_instance_id.into());
        self
    }

    pub fn with_configuration(mut self, configuration: impl Into<String>) -> Self {
        self.handler_configuration = Some(configuration.into());
        self
    }

    pub fn with_due_date(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn with_retries(mut self, retries: i32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn is_locked(&self) -> bool {
        self.lock_owner.is_some()
    }

    /// A copy under a new id and kind, without lock, exception or blob references
    ///
    /// Used when a job moves between kinds (timer → executable, executable →
    /// dead letter); the caller re-attaches copied blobs as needed.
    pub fn copy_as(&self, id: impl Into<String>, kind: JobKind) -> Job {
        Job {
            id: id.into(),
            revision: 0,
            kind,
            custom_values: None,
            exception: None,
            exception_message: None,
            lock_owner: None,
            lock_expiration_time: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_snake_case() {
        let job = Job::new("j1", JobKind::DeadLetter, "async-continuation");
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["kind"], "dead_letter");
        assert_eq!("dead_letter".parse::<JobKind>(), Ok(JobKind::DeadLetter));
    }

    #[test]
    fn test_due_date_serializes_as_millis() {
        let due = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_123).unwrap();
        let job = Job::new("j1", JobKind::Timer, "trigger-timer").with_due_date(due);
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["due_date"], 1_700_000_000_123i64);
        assert!(json["lock_expiration_time"].is_null());
    }

    #[test]
    fn test_copy_as_drops_lock_and_blobs() {
        let mut job = Job::new("j1", JobKind::Async, "async-continuation").with_execution_id("e1");
        job.lock_owner = Some("node-a".to_string());
        job.exception_message = Some("boom".to_string());
        job.revision = 7;

        let copy = job.copy_as("j2", JobKind::DeadLetter);
        assert_eq!(copy.id, "j2");
        assert_eq!(copy.kind, JobKind::DeadLetter);
        assert_eq!(copy.revision, 0);
        assert_eq!(copy.execution_id.as_deref(), Some("e1"));
        assert!(!copy.is_locked());
        assert!(copy.exception_message.is_none());
    }
}
