use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const FIELD_TYPE_DATE: &str = "date";
pub const FIELD_TYPE_EXPRESSION: &str = "expression";
pub const FIELD_TYPE_CONTAINER: &str = "container";

/// A deployed form definition with its JSON model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    pub id: String,
    pub key: String,
    pub name: Option<String>,
    pub version: i32,
    pub tenant_id: Option<String>,
    pub deployment_id: Option<String>,
    pub parent_deployment_id: Option<String>,
    /// Form model JSON as deployed
    pub model_json: String,
}

impl FormDefinition {
    /// Parse the deployed JSON and stamp it with this definition's identity
    pub fn to_model(&self) -> crate::errors::Result<FormModel> {
        let mut model: FormModel = serde_json::from_str(&self.model_json)?;
        model.id = Some(self.id.clone());
        model.key = Some(self.key.clone());
        model.name = self.name.clone();
        model.version = Some(self.version);
        Ok(model)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormModel {
    pub id: Option<String>,
    pub key: Option<String>,
    pub name: Option<String>,
    pub version: Option<i32>,
    #[serde(default)]
    pub fields: Vec<FormField>,
    #[serde(default)]
    pub outcomes: Vec<FormOutcome>,
}

impl FormModel {
    /// Every non-container field, depth first
    pub fn all_fields(&self) -> Vec<&FormField> {
        fn walk<'a>(fields: &'a [FormField], out: &mut Vec<&'a FormField>) {
            for field in fields {
                if field.is_container() {
                    for row in &field.rows {
                        walk(row, out);
                    }
                } else {
                    out.push(field);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.fields, &mut out);
        out
    }

    /// Visit every non-container field mutably, in `all_fields` order
    pub fn for_each_field_mut(&mut self, mut visit: impl FnMut(&mut FormField)) {
        fn walk(fields: &mut [FormField], visit: &mut impl FnMut(&mut FormField)) {
            for field in fields {
                if field.is_container() {
                    for row in &mut field.rows {
                        walk(row, visit);
                    }
                } else {
                    visit(field);
                }
            }
        }
        walk(&mut self.fields, &mut visit);
    }

    pub fn field(&self, id: &str) -> Option<&FormField> {
        self.all_fields().into_iter().find(|f| f.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Set on `expression` fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// Nested rows of a `container` field
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<Vec<FormField>>,
}

impl FormField {
    pub fn new(id: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field_type: field_type.into(),
            ..Self::default()
        }
    }

    pub fn is_container(&self) -> bool {
        self.field_type == FIELD_TYPE_CONTAINER
    }

    pub fn is_expression(&self) -> bool {
        self.field_type == FIELD_TYPE_EXPRESSION && self.expression.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormOutcome {
    pub id: Option<String>,
    pub name: String,
}

/// A submitted form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormInstance {
    pub id: String,
    pub form_definition_id: String,
    pub task_id: Option<String>,
    pub process_instance_id: Option<String>,
    pub submitted_date: DateTime<Utc>,
    /// Submission JSON, `{"values": {...}, "outcome": ...}`
    pub form_value_bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_containers_are_flattened() {
        let mut model: FormModel = serde_json::from_value(json!({
            "fields": [
                {"id": "name", "type": "text"},
                {"id": "c1", "type": "container", "rows": [
                    [{"id": "start", "type": "date"}],
                    [{"id": "total", "type": "expression", "expression": "${amount}"}]
                ]}
            ]
        }))
        .unwrap();

        let ids: Vec<&str> = model.all_fields().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["name", "start", "total"]);
        assert!(model.field("total").unwrap().is_expression());

        model.for_each_field_mut(|f| f.value = Some(json!(f.id.len())));
        assert_eq!(model.field("start").unwrap().value, Some(json!(5)));
    }
}
