use super::{Criteria, Database, FlushOp};
use crate::cache::EntityKind;
use crate::errors::{ProcxError, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

type Key = (EntityKind, String);

/// In-process `Database` backed by a map under a read/write lock
///
/// Flushes are validated against a staging overlay before anything is
/// written, so a failing op leaves the store untouched.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    rows: RwLock<BTreeMap<Key, Value>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows of one kind
    pub fn len(&self, kind: EntityKind) -> usize {
        self.rows
            .read()
            .map(|rows| rows.keys().filter(|(k, _)| *k == kind).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().map(|rows| rows.is_empty()).unwrap_or(true)
    }
}

fn poisoned() -> ProcxError {
    ProcxError::Internal {
        message: "memory database lock poisoned".to_string(),
    }
}

fn stored_revision(body: &Value) -> i64 {
    body.get("revision").and_then(Value::as_i64).unwrap_or(0)
}

fn check_revision(kind: EntityKind, id: &str, current: Option<&Value>, expected: i64) -> Result<()> {
    match current {
        Some(body) if stored_revision(body) == expected => Ok(()),
        _ => Err(ProcxError::OptimisticLock {
            kind: kind.to_string(),
            id: id.to_string(),
            revision: expected,
        }),
    }
}

impl Database for MemoryDatabase {
    fn find(&self, kind: EntityKind, id: &str) -> Result<Option<Value>> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.get(&(kind, id.to_string())).cloned())
    }

    fn select(&self, kind: EntityKind, criteria: &Criteria) -> Result<Vec<Value>> {
        criteria.validate()?;
        let rows = self.rows.read().map_err(|_| poisoned())?;
        let docs = rows
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, v)| v.clone());
        Ok(criteria.apply(docs))
    }

    fn count(&self, kind: EntityKind, criteria: &Criteria) -> Result<u64> {
        criteria.validate()?;
        let rows = self.rows.read().map_err(|_| poisoned())?;
        let n = rows
            .iter()
            .filter(|((k, _), v)| *k == kind && criteria.matches(v))
            .count();
        Ok(n as u64)
    }

    fn flush(&self, ops: &[FlushOp]) -> Result<()> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;

        // None in the overlay marks a staged delete
        let mut staged: HashMap<Key, Option<Value>> = HashMap::new();
        for op in ops {
            let key = (op.kind(), op.id().to_string());
            let current = match staged.get(&key) {
                Some(v) => v.as_ref(),
                None => rows.get(&key),
            };
            match op {
                FlushOp::Insert { kind, id, body } => {
                    if current.is_some() {
                        return Err(ProcxError::AlreadyExists {
                            kind: kind.to_string(),
                            id: id.clone(),
                        });
                    }
                    staged.insert(key, Some(body.clone()));
                }
                FlushOp::Update {
                    kind,
                    id,
                    expected_revision,
                    body,
                } => {
                    check_revision(*kind, id, current, *expected_revision)?;
                    staged.insert(key, Some(body.clone()));
                }
                FlushOp::Delete {
                    kind,
                    id,
                    expected_revision,
                } => {
                    check_revision(*kind, id, current, *expected_revision)?;
                    staged.insert(key, None);
                }
            }
        }

        for (key, value) in staged {
            match value {
                Some(body) => {
                    rows.insert(key, body);
                }
                None => {
                    rows.remove(&key);
                }
            }
        }
        Ok(())
    }
}
