use crate::errors::{ProcxError, Result};
use serde_json::Value;
use std::cmp::Ordering;

/// A single predicate over a top-level document field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    IsNull(String),
    NotNull(String),
    Lt(String, Value),
    Le(String, Value),
    /// Field is null or less than or equal to the value
    NullOrLe(String, Value),
    In(String, Vec<Value>),
}

impl Condition {
    pub fn field(&self) -> &str {
        match self {
            Condition::Eq(f, _)
            | Condition::IsNull(f)
            | Condition::NotNull(f)
            | Condition::Lt(f, _)
            | Condition::Le(f, _)
            | Condition::NullOrLe(f, _)
            | Condition::In(f, _) => f,
        }
    }

    /// Evaluate against a document, with SQL null semantics
    pub fn matches(&self, doc: &Value) -> bool {
        let value = field_of(doc, self.field());
        match self {
            Condition::Eq(_, expected) => !value.is_null() && values_equal(value, expected),
            Condition::IsNull(_) => value.is_null(),
            Condition::NotNull(_) => !value.is_null(),
            Condition::Lt(_, bound) => compare_values(value, bound) == Some(Ordering::Less),
            Condition::Le(_, bound) => matches!(
                compare_values(value, bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Condition::NullOrLe(_, bound) => {
                value.is_null()
                    || matches!(
                        compare_values(value, bound),
                        Some(Ordering::Less | Ordering::Equal)
                    )
            }
            Condition::In(_, options) => {
                !value.is_null() && options.iter().any(|o| values_equal(value, o))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Offset/limit paging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub first_result: usize,
    pub max_results: usize,
}

impl Page {
    pub fn new(first_result: usize, max_results: usize) -> Self {
        Self {
            first_result,
            max_results,
        }
    }

    pub fn first(max_results: usize) -> Self {
        Self::new(0, max_results)
    }
}

/// Conjunction of conditions plus ordering and paging
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    pub conditions: Vec<Condition>,
    pub order_by: Vec<(String, SortOrder)>,
    pub page: Option<Page>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Eq(field.to_string(), value.into()));
        self
    }

    pub fn is_null(mut self, field: &str) -> Self {
        self.conditions.push(Condition::IsNull(field.to_string()));
        self
    }

    pub fn not_null(mut self, field: &str) -> Self {
        self.conditions.push(Condition::NotNull(field.to_string()));
        self
    }

    pub fn lt(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Lt(field.to_string(), value.into()));
        self
    }

    pub fn le(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Le(field.to_string(), value.into()));
        self
    }

    pub fn null_or_le(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::NullOrLe(field.to_string(), value.into()));
        self
    }

    pub fn is_in(mut self, field: &str, values: Vec<Value>) -> Self {
        self.conditions.push(Condition::In(field.to_string(), values));
        self
    }

    pub fn order_asc(mut self, field: &str) -> Self {
        self.order_by.push((field.to_string(), SortOrder::Asc));
        self
    }

    pub fn order_desc(mut self, field: &str) -> Self {
        self.order_by.push((field.to_string(), SortOrder::Desc));
        self
    }

    pub fn with_page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    /// Same conditions, no ordering or paging (for counts)
    pub fn without_page(&self) -> Self {
        Self {
            conditions: self.conditions.clone(),
            order_by: Vec::new(),
            page: None,
        }
    }

    /// Field names must be plain identifiers; backends splice them into paths
    pub fn validate(&self) -> Result<()> {
        let fields = self
            .conditions
            .iter()
            .map(Condition::field)
            .chain(self.order_by.iter().map(|(f, _)| f.as_str()));
        for field in fields {
            let valid = !field.is_empty()
                && field
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
            if !valid {
                return Err(ProcxError::InvalidQuery {
                    message: format!("invalid field name '{}'", field),
                });
            }
        }
        Ok(())
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(doc))
    }

    /// Ordering of two documents under `order_by`, falling back to `id`
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        for (field, order) in &self.order_by {
            let ord = sort_key_cmp(field_of(a, field), field_of(b, field));
            let ord = match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        sort_key_cmp(field_of(a, "id"), field_of(b, "id"))
    }

    /// Filter, sort and page a set of documents in memory
    pub fn apply(&self, docs: impl IntoIterator<Item = Value>) -> Vec<Value> {
        let mut matched: Vec<Value> = docs.into_iter().filter(|d| self.matches(d)).collect();
        matched.sort_by(|a, b| self.compare(a, b));
        match self.page {
            Some(p) => matched
                .into_iter()
                .skip(p.first_result)
                .take(p.max_results)
                .collect(),
            None => matched,
        }
    }
}

fn field_of<'a>(doc: &'a Value, field: &str) -> &'a Value {
    doc.get(field).unwrap_or(&Value::Null)
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order used for sorting: null < numbers < strings < everything else
fn sort_key_cmp(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) | Value::Number(_) => 1,
            Value::String(_) => 2,
            _ => 3,
        }
    }
    rank(a)
        .cmp(&rank(b))
        .then_with(|| compare_values(a, b).unwrap_or(Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_semantics() {
        let doc = json!({"id": "j1", "lock_owner": null, "due_date": null});
        assert!(Condition::IsNull("lock_owner".into()).matches(&doc));
        assert!(Condition::IsNull("missing".into()).matches(&doc));
        assert!(!Condition::Eq("lock_owner".into(), Value::Null).matches(&doc));
        assert!(!Condition::Le("due_date".into(), json!(10)).matches(&doc));
        assert!(Condition::NullOrLe("due_date".into(), json!(10)).matches(&doc));
    }

    #[test]
    fn test_bool_compares_as_integer() {
        let doc = json!({"exclusive": true});
        assert!(Condition::Eq("exclusive".into(), json!(true)).matches(&doc));
        assert!(Condition::Eq("exclusive".into(), json!(1)).matches(&doc));
    }

    #[test]
    fn test_apply_orders_nulls_first_and_pages() {
        let docs = vec![
            json!({"id": "a", "due_date": 30}),
            json!({"id": "b", "due_date": null}),
            json!({"id": "c", "due_date": 10}),
        ];
        let ids = |v: Vec<Value>| -> Vec<String> {
            v.iter().map(|d| d["id"].as_str().unwrap().to_string()).collect()
        };

        let asc = Criteria::new().order_asc("due_date");
        assert_eq!(ids(asc.apply(docs.clone())), vec!["b", "c", "a"]);

        let paged = Criteria::new()
            .order_desc("due_date")
            .with_page(Page::new(1, 1));
        assert_eq!(ids(paged.apply(docs)), vec!["c"]);
    }

    #[test]
    fn test_validate_rejects_injection() {
        assert!(Criteria::new().eq("execution_id", "e1").validate().is_ok());
        let err = Criteria::new()
            .eq("x') OR 1=1 --", "e1")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ProcxError::InvalidQuery { .. }));
    }
}
