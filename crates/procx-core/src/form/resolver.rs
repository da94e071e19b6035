//! Collaborators of form filling: definition lookup, submissions, expressions

use super::model::{FormDefinition, FormInstance};
use crate::errors::{ProcxError, Result};
use serde_json::{Map, Value};
use std::sync::RwLock;

/// Tenant id meaning "no tenant"
pub const NO_TENANT_ID: &str = "";

/// Deployed form definitions; the `latest` lookups return the highest version
pub trait FormDefinitionResolver: Send + Sync {
    fn find_by_id(&self, id: &str) -> Result<Option<FormDefinition>>;

    fn find_latest_by_key(&self, key: &str) -> Result<Option<FormDefinition>>;

    fn find_latest_by_key_and_tenant(&self, key: &str, tenant_id: &str) -> Result<Option<FormDefinition>>;

    fn find_latest_by_key_and_parent_deployment(
        &self,
        key: &str,
        parent_deployment_id: &str,
    ) -> Result<Option<FormDefinition>>;

    fn find_latest_by_key_parent_deployment_and_tenant(
        &self,
        key: &str,
        parent_deployment_id: &str,
        tenant_id: &str,
    ) -> Result<Option<FormDefinition>>;
}

/// Prior submissions of a form
pub trait FormInstanceQuery: Send + Sync {
    /// Submissions for (`form_definition_id`, `task_id`), latest first
    fn find_by_definition_and_task(&self, form_definition_id: &str, task_id: &str) -> Result<Vec<FormInstance>>;
}

pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, variables: &Map<String, Value>) -> Result<Value>;
}

/// Resolves `${name}` and `${name.path.to.field}` against the variables
#[derive(Debug, Default, Clone, Copy)]
pub struct VariableExpressionEvaluator;

impl ExpressionEvaluator for VariableExpressionEvaluator {
    fn evaluate(&self, expression: &str, variables: &Map<String, Value>) -> Result<Value> {
        let fail = |message: &str| ProcxError::Expression {
            expression: expression.to_string(),
            message: message.to_string(),
        };
        let path = expression
            .trim()
            .strip_prefix("${")
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or_else(|| fail("expected ${...}"))?;
        let mut segments = path.split('.').map(str::trim);
        let first = segments.next().filter(|s| !s.is_empty()).ok_or_else(|| fail("empty expression"))?;
        let mut value = variables
            .get(first)
            .ok_or_else(|| fail(&format!("unknown property '{}'", first)))?;
        for segment in segments {
            value = value
                .get(segment)
                .ok_or_else(|| fail(&format!("unknown property '{}'", segment)))?;
        }
        Ok(value.clone())
    }
}

/// In-memory form definitions and submissions
#[derive(Debug, Default)]
pub struct InMemoryFormRepository {
    definitions: RwLock<Vec<FormDefinition>>,
    instances: RwLock<Vec<FormInstance>>,
}

impl InMemoryFormRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `definition`, replacing any definition with the same id
    pub fn deploy(&self, definition: FormDefinition) -> Result<()> {
        let mut defs = self.definitions.write().map_err(|_| ProcxError::Internal {
            message: "form definition lock poisoned".to_string(),
        })?;
        defs.retain(|d| d.id != definition.id);
        defs.push(definition);
        Ok(())
    }

    pub fn submit(&self, instance: FormInstance) -> Result<()> {
        self.instances
            .write()
            .map_err(|_| ProcxError::Internal {
                message: "form instance lock poisoned".to_string(),
            })?
            .push(instance);
        Ok(())
    }

    fn latest(&self, filter: impl Fn(&FormDefinition) -> bool) -> Result<Option<FormDefinition>> {
        let defs = self.definitions.read().map_err(|_| ProcxError::Internal {
            message: "form definition lock poisoned".to_string(),
        })?;
        Ok(defs.iter().filter(|d| filter(d)).max_by_key(|d| d.version).cloned())
    }
}

fn tenant_is(definition: &FormDefinition, tenant_id: &str) -> bool {
    definition.tenant_id.as_deref().unwrap_or(NO_TENANT_ID) == tenant_id
}

impl FormDefinitionResolver for InMemoryFormRepository {
    fn find_by_id(&self, id: &str) -> Result<Option<FormDefinition>> {
        self.latest(|d| d.id == id)
    }

    fn find_latest_by_key(&self, key: &str) -> Result<Option<FormDefinition>> {
        self.latest(|d| d.key == key && tenant_is(d, NO_TENANT_ID))
    }

    fn find_latest_by_key_and_tenant(&self, key: &str, tenant_id: &str) -> Result<Option<FormDefinition>> {
        self.latest(|d| d.key == key && tenant_is(d, tenant_id))
    }

    fn find_latest_by_key_and_parent_deployment(
        &self,
        key: &str,
        parent_deployment_id: &str,
    ) -> Result<Option<FormDefinition>> {
        self.latest(|d| {
            d.key == key
                && tenant_is(d, NO_TENANT_ID)
                && d.parent_deployment_id.as_deref() == Some(parent_deployment_id)
        })
    }

    fn find_latest_by_key_parent_deployment_and_tenant(
        &self,
        key: &str,
        parent_deployment_id: &str,
        tenant_id: &str,
    ) -> Result<Option<FormDefinition>> {
        self.latest(|d| {
            d.key == key && tenant_is(d, tenant_id) && d.parent_deployment_id.as_deref() == Some(parent_deployment_id)
        })
    }
}

impl FormInstanceQuery for InMemoryFormRepository {
    fn find_by_definition_and_task(&self, form_definition_id: &str, task_id: &str) -> Result<Vec<FormInstance>> {
        let instances = self.instances.read().map_err(|_| ProcxError::Internal {
            message: "form instance lock poisoned".to_string(),
        })?;
        let mut found: Vec<FormInstance> = instances
            .iter()
            .filter(|i| i.form_definition_id == form_definition_id && i.task_id.as_deref() == Some(task_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.submitted_date.cmp(&a.submitted_date));
        Ok(found)
    }
}
