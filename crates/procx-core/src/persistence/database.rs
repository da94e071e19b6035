use super::Criteria;
use crate::cache::{Entity, EntityKind};
use crate::errors::Result;
use serde_json::Value;

/// One write in a unit-of-work flush
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOp {
    Insert {
        kind: EntityKind,
        id: String,
        body: Value,
    },
    /// Replace the row if its stored revision equals `expected_revision`
    Update {
        kind: EntityKind,
        id: String,
        expected_revision: i64,
        body: Value,
    },
    /// Remove the row if its stored revision equals `expected_revision`
    Delete {
        kind: EntityKind,
        id: String,
        expected_revision: i64,
    },
}

impl FlushOp {
    pub fn kind(&self) -> EntityKind {
        match self {
            FlushOp::Insert { kind, .. }
            | FlushOp::Update { kind, .. }
            | FlushOp::Delete { kind, .. } => *kind,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            FlushOp::Insert { id, .. } | FlushOp::Update { id, .. } | FlushOp::Delete { id, .. } => id,
        }
    }
}

/// Durable document store shared by all units of work
///
/// Implementations provide transaction isolation: `flush` applies every op or
/// none, and fails with `OptimisticLock` when a stored revision differs from
/// the expected one.
pub trait Database: Send + Sync {
    fn find(&self, kind: EntityKind, id: &str) -> Result<Option<Value>>;

    fn select(&self, kind: EntityKind, criteria: &Criteria) -> Result<Vec<Value>>;

    fn count(&self, kind: EntityKind, criteria: &Criteria) -> Result<u64>;

    fn flush(&self, ops: &[FlushOp]) -> Result<()>;
}

/// Deserialize stored documents into entities
pub fn decode_rows<E: Entity>(rows: Vec<Value>) -> Result<Vec<E>> {
    rows.into_iter()
        .map(|r| serde_json::from_value(r).map_err(Into::into))
        .collect()
}
