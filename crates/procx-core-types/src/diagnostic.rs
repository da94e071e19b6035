//! Diagnostic context for log correlation
//!
//! Carried explicitly by every unit of work and handed to operations and
//! history transformers. Whatever is set here is attached to error logs so a
//! failure can be traced back to the execution or job that caused it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticContext {
    pub execution_id: Option<String>,
    pub process_instance_id: Option<String>,
    pub process_definition_id: Option<String>,
    pub activity_id: Option<String>,
    pub job_id: Option<String>,
}

impl DiagnosticContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag the context with the identifiers of one execution
    pub fn tag_execution(
        &mut self,
        execution_id: &str,
        process_instance_id: Option<&str>,
        process_definition_id: Option<&str>,
        activity_id: Option<&str>,
    ) {
        self.execution_id = Some(execution_id.to_string());
        self.process_instance_id = process_instance_id.map(str::to_string);
        self.process_definition_id = process_definition_id.map(str::to_string);
        self.activity_id = activity_id.map(str::to_string);
    }

    pub fn tag_job(&mut self, job_id: &str) {
        self.job_id = Some(job_id.to_string());
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Render as `key=value` pairs, skipping unset fields
    pub fn describe(&self) -> String {
        [
            ("execution_id", &self.execution_id),
            ("process_instance_id", &self.process_instance_id),
            ("process_definition_id", &self.process_definition_id),
            ("activity_id", &self.activity_id),
            ("job_id", &self.job_id),
        ]
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| format!("{}={}", k, v)))
        .collect::<Vec<_>>()
        .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_execution_overwrites_previous_tag() {
        let mut diag = DiagnosticContext::new();
        diag.tag_execution("e1", Some("p1"), None, Some("task"));
        diag.tag_execution("e2", None, None, None);

        assert_eq!(diag.execution_id.as_deref(), Some("e2"));
        assert!(diag.process_instance_id.is_none());
        assert!(diag.activity_id.is_none());
    }

    #[test]
    fn test_describe_skips_unset_fields() {
        let mut diag = DiagnosticContext::new();
        assert!(diag.is_empty());
        assert_eq!(diag.describe(), "");

        diag.tag_execution("e1", Some("p1"), None, None);
        diag.tag_job("j1");
        assert_eq!(diag.describe(), "execution_id=e1 process_instance_id=p1 job_id=j1");
    }

    #[test]
    fn test_clear() {
        let mut diag = DiagnosticContext::new();
        diag.tag_job("j1");
        diag.clear();
        assert!(diag.is_empty());
    }
}
