use super::activity::{ActivityEndTransformer, ActivityStartTransformer};
use super::task::{TaskCreatedTransformer, TaskEndedTransformer};
use crate::context::CommandContext;
use crate::errors::Result;
use crate::model::Job;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Applies facts of one or more types to the historic store
pub trait HistoryJsonTransformer: Send + Sync {
    fn types(&self) -> &[&'static str];

    fn matches_type(&self, fact_type: &str) -> bool {
        self.types().contains(&fact_type)
    }

    /// Whether `fact` can be applied now; `false` fails the job for a later retry
    fn is_applicable(&self, fact: &Value, ctx: &mut CommandContext) -> Result<bool>;

    fn transform(&self, job: &Job, fact: &Value, ctx: &mut CommandContext) -> Result<()>;
}

/// Transformers keyed by fact type; fixed at startup
#[derive(Default)]
pub struct TransformerRegistry {
    by_type: HashMap<String, Arc<dyn HistoryJsonTransformer>>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TaskCreatedTransformer));
        registry.register(Arc::new(TaskEndedTransformer));
        registry.register(Arc::new(ActivityStartTransformer));
        registry.register(Arc::new(ActivityEndTransformer));
        registry
    }

    /// Register `transformer` under each of its types
    pub fn register(&mut self, transformer: Arc<dyn HistoryJsonTransformer>) {
        for fact_type in transformer.types() {
            self.by_type
                .insert((*fact_type).to_string(), Arc::clone(&transformer));
        }
    }

    pub fn get(&self, fact_type: &str) -> Option<Arc<dyn HistoryJsonTransformer>> {
        self.by_type
            .get(fact_type)
            .filter(|t| t.matches_type(fact_type))
            .cloned()
    }

    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.by_type.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

/// Timestamp guard of the mutable fields
///
/// A fact applies unless the record was last updated strictly after it.
pub(crate) fn accepts(last_updated: Option<DateTime<Utc>>, fact_time: DateTime<Utc>) -> bool {
    last_updated.map_or(true, |last| last <= fact_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_guard_accepts_equal_and_newer() {
        let t = Utc::now();
        assert!(accepts(None, t));
        assert!(accepts(Some(t), t));
        assert!(accepts(Some(t - Duration::seconds(1)), t));
        assert!(!accepts(Some(t + Duration::seconds(1)), t));
    }

    #[test]
    fn test_default_registry_types() {
        let registry = TransformerRegistry::with_defaults();
        assert_eq!(
            registry.types(),
            vec!["activity-end", "activity-start", "task-created", "task-ended"]
        );
        assert!(registry.get("variable-updated").is_none());
    }
}
