use super::JobKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A path of execution through a process instance
///
/// The process instance itself is the root execution (`parent_id == None`,
/// `process_instance_id == id`). Executions with `count_enabled` keep
/// denormalized counts of their linked jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    #[serde(default)]
    pub revision: i64,
    pub parent_id: Option<String>,
    pub process_instance_id: String,
    pub process_definition_id: String,
    /// Current flow element
    pub activity_id: Option<String>,
    pub tenant_id: Option<String>,
    pub deployment_id: Option<String>,
    pub is_active: bool,
    pub is_scope: bool,
    pub is_multi_instance_root: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    pub count_enabled: bool,
    #[serde(default)]
    pub job_count: i32,
    #[serde(default)]
    pub timer_job_count: i32,
    #[serde(default)]
    pub suspended_job_count: i32,
    #[serde(default)]
    pub dead_letter_job_count: i32,
    /// Linked job ids, loaded lazily by the job manager
    #[serde(skip)]
    pub(crate) jobs: Option<Vec<String>>,
}

impl Execution {
    /// A new root execution for `process_definition_id`
    pub fn new_process_instance(id: impl Into<String>, process_definition_id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            process_instance_id: id.clone(),
            id,
            revision: 0,
            parent_id: None,
            process_definition_id: process_definition_id.into(),
            activity_id: None,
            tenant_id: None,
            deployment_id: None,
            is_active: true,
            is_scope: true,
            is_multi_instance_root: false,
            start_time: None,
            variables: BTreeMap::new(),
            count_enabled: true,
            job_count: 0,
            timer_job_count: 0,
            suspended_job_count: 0,
            dead_letter_job_count: 0,
            jobs: None,
        }
    }

    /// A child execution sharing the parent's process instance, definition and tenant
    pub fn new_child(id: impl Into<String>, parent: &Execution) -> Self {
        let mut child = Self::new_process_instance(id, parent.process_definition_id.clone());
        child.parent_id = Some(parent.id.clone());
        child.process_instance_id = parent.process_instance_id.clone();
        child.tenant_id = parent.tenant_id.clone();
        child.deployment_id = parent.deployment_id.clone();
        child.count_enabled = parent.count_enabled;
        child.is_scope = false;
        child
    }

    pub fn with_activity(mut self, activity_id: impl Into<String>) -> Self {
        self.activity_id = Some(activity_id.into());
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_count_enabled(mut self, enabled: bool) -> Self {
        self.count_enabled = enabled;
        self
    }

    pub fn is_process_instance(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn set_variable_local(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn get_variable_local(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn has_variable_local(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn remove_variable_local(&mut self, name: &str) -> Option<Value> {
        self.variables.remove(name)
    }

    /// Linked job ids, `None` until the job manager has loaded them
    pub fn jobs(&self) -> Option<&[String]> {
        self.jobs.as_deref()
    }

    pub fn job_counter(&self, kind: JobKind) -> i32 {
        match kind {
            JobKind::Async | JobKind::History => self.job_count,
            JobKind::Timer => self.timer_job_count,
            JobKind::Suspended => self.suspended_job_count,
            JobKind::DeadLetter => self.dead_letter_job_count,
        }
    }

    fn job_counter_mut(&mut self, kind: JobKind) -> &mut i32 {
        match kind {
            JobKind::Async | JobKind::History => &mut self.job_count,
            JobKind::Timer => &mut self.timer_job_count,
            JobKind::Suspended => &mut self.suspended_job_count,
            JobKind::DeadLetter => &mut self.dead_letter_job_count,
        }
    }

    pub(crate) fn increment_job_counter(&mut self, kind: JobKind) {
        *self.job_counter_mut(kind) += 1;
    }

    /// Decrement, clamping at zero
    pub(crate) fn decrement_job_counter(&mut self, kind: JobKind) {
        let id = self.id.clone();
        let counter = self.job_counter_mut(kind);
        if *counter <= 0 {
            tracing::warn!(
                execution_id = %id,
                job_kind = kind.as_str(),
                "job counter already zero; unpaired decrement ignored"
            );
            *counter = 0;
        } else {
            *counter -= 1;
        }
    }
}
