use super::model::{FormDefinition, FormInstance, FormModel, FIELD_TYPE_DATE};
use super::resolver::NO_TENANT_ID;
use crate::context::FormServices;
use crate::errors::{ProcxError, Result};
use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};

const SUBMITTED_DATE_FORMAT: &str = "%Y-%m-%d";
const DISPLAY_DATE_FORMAT: &str = "%Y-%-m-%-d";

/// Parameters of a form model lookup
#[derive(Debug, Clone, Default)]
pub struct FormModelRequest {
    pub form_definition_id: Option<String>,
    pub form_definition_key: Option<String>,
    pub parent_deployment_id: Option<String>,
    pub tenant_id: Option<String>,
    pub process_instance_id: Option<String>,
    /// Task whose latest submission pre-fills the form
    pub task_id: Option<String>,
    pub variables: Map<String, Value>,
}

impl FormModelRequest {
    pub fn by_id(form_definition_id: impl Into<String>) -> Self {
        Self {
            form_definition_id: Some(form_definition_id.into()),
            ..Self::default()
        }
    }

    pub fn by_key(form_definition_key: impl Into<String>) -> Self {
        Self {
            form_definition_key: Some(form_definition_key.into()),
            ..Self::default()
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_parent_deployment(mut self, parent_deployment_id: impl Into<String>) -> Self {
        self.parent_deployment_id = Some(parent_deployment_id.into());
        self
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }
}

fn not_found(message: String) -> ProcxError {
    ProcxError::ObjectNotFound {
        object_type: "FormDefinition".to_string(),
        message,
    }
}

/// Form model of the requested definition, filled from the latest submission
/// for the task and from the variables
pub fn get_form_model_with_variables(forms: &FormServices, request: FormModelRequest) -> Result<FormModel> {
    let definition = resolve_form_definition(forms, &request)?;
    let instance = resolve_form_instance(forms, &definition, request.task_id.as_deref())?;
    let mut model = definition.to_model()?;
    let mut variables = request.variables;
    fill_form_field_values(
        forms,
        instance.as_ref(),
        &mut model,
        &mut variables,
        request.process_instance_id.as_deref(),
    )?;
    Ok(model)
}

/// Pick the lookup from which identifiers are present
///
/// An id always wins. A key is scoped by tenant and parent deployment when
/// given; the empty tenant id counts as no tenant.
pub fn resolve_form_definition(forms: &FormServices, request: &FormModelRequest) -> Result<FormDefinition> {
    let resolver = &forms.resolver;
    if let Some(id) = &request.form_definition_id {
        return resolver
            .find_by_id(id)?
            .ok_or_else(|| not_found(format!("No form definition found for id = '{}'", id)));
    }
    let Some(key) = &request.form_definition_key else {
        return Err(not_found("formDefinitionKey and formDefinitionId are null".to_string()));
    };
    let tenant = request.tenant_id.as_deref().filter(|t| *t != NO_TENANT_ID);

    match (tenant, request.parent_deployment_id.as_deref()) {
        (None, None) => resolver
            .find_latest_by_key(key)?
            .ok_or_else(|| not_found(format!("No form definition found for key '{}'", key))),
        (Some(tenant), None) => resolver.find_latest_by_key_and_tenant(key, tenant)?.ok_or_else(|| {
            not_found(format!(
                "No form definition found for key '{}' for tenant identifier {}",
                key, tenant
            ))
        }),
        (None, Some(parent)) => resolver
            .find_latest_by_key_and_parent_deployment(key, parent)?
            .ok_or_else(|| {
                not_found(format!(
                    "No form definition found for key '{}' for parent deployment id {}",
                    key, parent
                ))
            }),
        (Some(tenant), Some(parent)) => resolver
            .find_latest_by_key_parent_deployment_and_tenant(key, parent, tenant)?
            .ok_or_else(|| {
                not_found(format!(
                    "No form definition found for key '{}' for parent deployment id '{}' and for tenant identifier {}",
                    key, parent, tenant
                ))
            }),
    }
}

fn resolve_form_instance(
    forms: &FormServices,
    definition: &FormDefinition,
    task_id: Option<&str>,
) -> Result<Option<FormInstance>> {
    let Some(task_id) = task_id else {
        return Ok(None);
    };
    Ok(forms
        .instances
        .find_by_definition_and_task(&definition.id, task_id)?
        .into_iter()
        .next())
}

/// Submitted `values` of a form instance
fn submitted_values(instance: &FormInstance) -> Result<Map<String, Value>> {
    let submitted: Value = serde_json::from_slice(&instance.form_value_bytes).map_err(|e| ProcxError::Runtime {
        message: format!("Error parsing form instance {}: {}", instance.id, e),
    })?;
    Ok(match submitted.get("values") {
        Some(Value::Object(values)) => values.clone(),
        _ => Map::new(),
    })
}

/// Text of a submitted JSON value
fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// `2026-03-07` → `2026-3-7`; RFC 3339 timestamps keep their date part
fn display_date(text: &str) -> Option<String> {
    NaiveDate::parse_from_str(text, SUBMITTED_DATE_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|d| d.date_naive()))
        .map(|d| d.format(DISPLAY_DATE_FORMAT).to_string())
}

fn fill_form_field_values(
    forms: &FormServices,
    instance: Option<&FormInstance>,
    model: &mut FormModel,
    variables: &mut Map<String, Value>,
    process_instance_id: Option<&str>,
) -> Result<()> {
    if let Some(instance) = instance {
        let submitted = submitted_values(instance)?;
        for field in model.all_fields() {
            let Some(value) = submitted.get(&field.id).filter(|v| !v.is_null()) else {
                continue;
            };
            let text = as_text(value);
            if field.field_type == FIELD_TYPE_DATE {
                if text.is_empty() {
                    continue;
                }
                match NaiveDate::parse_from_str(&text, SUBMITTED_DATE_FORMAT) {
                    Ok(date) => {
                        variables.insert(field.id.clone(), Value::String(date.format(DISPLAY_DATE_FORMAT).to_string()));
                    }
                    Err(e) => tracing::error!(
                        process_instance_id = process_instance_id.unwrap_or_default(),
                        value = %text,
                        error = %e,
                        "error parsing submitted form date value"
                    ),
                }
            } else {
                variables.insert(field.id.clone(), Value::String(text));
            }
        }
    }

    let evaluator = &forms.expressions;
    model.for_each_field_mut(|field| {
        if field.is_expression() {
            let expression = field.expression.as_deref().unwrap_or_default();
            match evaluator.evaluate(expression, variables) {
                Ok(value) => field.value = Some(value),
                Err(e) => tracing::error!(
                    expression,
                    error = %e,
                    "error getting value for form expression"
                ),
            }
            return;
        }
        match variables.get(&field.id) {
            Some(Value::Null) | None => {}
            Some(Value::String(text)) if field.field_type == FIELD_TYPE_DATE => {
                field.value = Some(Value::String(display_date(text).unwrap_or_else(|| text.clone())));
            }
            Some(value) => field.value = Some(value.clone()),
        }
    });
    Ok(())
}
