//! SQLite implementation of the core `Database`
//!
//! Every entity is a row of `entities(kind, id, revision, body)` with the
//! JSON document in `body`. Criteria translate to `json_extract` predicates,
//! so query semantics match the in-memory store: SQL null handling, booleans
//! compared as integers, nulls first in ascending order.

use crate::db;
use crate::errors::{corrupt_row, from_rusqlite};
use crate::migrations::apply_migrations;
use procx_core::cache::EntityKind;
use procx_core::persistence::{Condition, Criteria, Database, FlushOp, SortOrder};
use procx_core::{ProcxError, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Open (creating if needed) and migrate the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut conn = db::open(path)?;
        db::configure(&conn)?;
        apply_migrations(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let mut conn = db::open_in_memory()?;
        apply_migrations(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already migrated connection
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn: Mutex::new(conn) }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| ProcxError::Internal {
            message: "sqlite connection lock poisoned".to_string(),
        })
    }
}

fn json_path(field: &str) -> String {
    format!("json_extract(body, '$.{}')", field)
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// `WHERE` clause and its parameters; the first parameter is the kind
fn where_clause(kind: EntityKind, criteria: &Criteria) -> Result<(String, Vec<SqlValue>)> {
    criteria.validate()?;
    let mut sql = String::from(" WHERE kind = ?");
    let mut params = vec![SqlValue::Text(kind.as_str().to_string())];

    for condition in &criteria.conditions {
        let path = json_path(condition.field());
        let clause = match condition {
            Condition::Eq(_, v) => {
                params.push(to_sql(v));
                format!("{} = ?", path)
            }
            Condition::IsNull(_) => format!("{} IS NULL", path),
            Condition::NotNull(_) => format!("{} IS NOT NULL", path),
            Condition::Lt(_, v) => {
                params.push(to_sql(v));
                format!("{} < ?", path)
            }
            Condition::Le(_, v) => {
                params.push(to_sql(v));
                format!("{} <= ?", path)
            }
            Condition::NullOrLe(_, v) => {
                params.push(to_sql(v));
                format!("({0} IS NULL OR {0} <= ?)", path)
            }
            Condition::In(_, values) if values.is_empty() => "0".to_string(),
            Condition::In(_, values) => {
                params.extend(values.iter().map(to_sql));
                let marks = vec!["?"; values.len()].join(", ");
                format!("{} IN ({})", path, marks)
            }
        };
        sql.push_str(" AND ");
        sql.push_str(&clause);
    }
    Ok((sql, params))
}

fn order_clause(criteria: &Criteria) -> String {
    let mut terms: Vec<String> = criteria
        .order_by
        .iter()
        .map(|(field, order)| {
            let dir = match order {
                SortOrder::Asc => "ASC",
                SortOrder::Desc => "DESC",
            };
            format!("{} {}", json_path(field), dir)
        })
        .collect();
    terms.push("id ASC".to_string());
    format!(" ORDER BY {}", terms.join(", "))
}

fn stored_revision(tx: &Transaction<'_>, kind: EntityKind, id: &str) -> Result<Option<i64>> {
    tx.query_row(
        "SELECT revision FROM entities WHERE kind = ?1 AND id = ?2",
        params![kind.as_str(), id],
        |row| row.get(0),
    )
    .optional()
    .map_err(from_rusqlite)
}

fn body_revision(body: &Value) -> i64 {
    body.get("revision").and_then(Value::as_i64).unwrap_or(0)
}

fn optimistic_lock(kind: EntityKind, id: &str, revision: i64) -> ProcxError {
    ProcxError::OptimisticLock {
        kind: kind.to_string(),
        id: id.to_string(),
        revision,
    }
}

fn apply_op(tx: &Transaction<'_>, op: &FlushOp) -> Result<()> {
    match op {
        FlushOp::Insert { kind, id, body } => {
            if stored_revision(tx, *kind, id)?.is_some() {
                return Err(ProcxError::AlreadyExists {
                    kind: kind.to_string(),
                    id: id.clone(),
                });
            }
            tx.execute(
                "INSERT INTO entities (kind, id, revision, body) VALUES (?1, ?2, ?3, ?4)",
                params![kind.as_str(), id, body_revision(body), body.to_string()],
            )
            .map_err(from_rusqlite)?;
        }
        FlushOp::Update {
            kind,
            id,
            expected_revision,
            body,
        } => {
            let changed = tx
                .execute(
                    "UPDATE entities SET revision = ?1, body = ?2
                     WHERE kind = ?3 AND id = ?4 AND revision = ?5",
                    params![body_revision(body), body.to_string(), kind.as_str(), id, expected_revision],
                )
                .map_err(from_rusqlite)?;
            if changed == 0 {
                return Err(optimistic_lock(*kind, id, *expected_revision));
            }
        }
        FlushOp::Delete {
            kind,
            id,
            expected_revision,
        } => {
            let changed = tx
                .execute(
                    "DELETE FROM entities WHERE kind = ?1 AND id = ?2 AND revision = ?3",
                    params![kind.as_str(), id, expected_revision],
                )
                .map_err(from_rusqlite)?;
            if changed == 0 {
                return Err(optimistic_lock(*kind, id, *expected_revision));
            }
        }
    }
    Ok(())
}

impl Database for SqliteDatabase {
    fn find(&self, kind: EntityKind, id: &str) -> Result<Option<Value>> {
        let conn = self.lock()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM entities WHERE kind = ?1 AND id = ?2",
                params![kind.as_str(), id],
                |row| row.get(0),
            )
            .optional()
            .map_err(from_rusqlite)?;
        body.map(|b| serde_json::from_str(&b).map_err(|e| corrupt_row(kind.as_str(), id, e)))
            .transpose()
    }

    fn select(&self, kind: EntityKind, criteria: &Criteria) -> Result<Vec<Value>> {
        let (filter, mut params) = where_clause(kind, criteria)?;
        let mut sql = format!("SELECT id, body FROM entities{}{}", filter, order_clause(criteria));
        if let Some(page) = criteria.page {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(SqlValue::Integer(i64::try_from(page.max_results).unwrap_or(i64::MAX)));
            params.push(SqlValue::Integer(i64::try_from(page.first_result).unwrap_or(i64::MAX)));
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        rows.into_iter()
            .map(|(id, body)| serde_json::from_str(&body).map_err(|e| corrupt_row(kind.as_str(), &id, e)))
            .collect()
    }

    fn count(&self, kind: EntityKind, criteria: &Criteria) -> Result<u64> {
        let (filter, params) = where_clause(kind, criteria)?;
        let sql = format!("SELECT COUNT(*) FROM entities{}", filter);
        let conn = self.lock()?;
        let n: i64 = conn
            .query_row(&sql, params_from_iter(params), |row| row.get(0))
            .map_err(from_rusqlite)?;
        Ok(u64::try_from(n).unwrap_or_default())
    }

    fn flush(&self, ops: &[FlushOp]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(from_rusqlite)?;
        for op in ops {
            // dropping the transaction on error rolls it back
            apply_op(&tx, op)?;
        }
        tx.commit().map_err(from_rusqlite)?;
        tracing::trace!(ops = ops.len(), "sqlite flush committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_where_clause_binds_kind_first() {
        let criteria = Criteria::new()
            .eq("exclusive", true)
            .null_or_le("due_date", 10)
            .is_in("kind", vec![]);
        let (sql, params) = where_clause(EntityKind::Job, &criteria).unwrap();

        assert_eq!(
            sql,
            " WHERE kind = ? AND json_extract(body, '$.exclusive') = ? \
             AND (json_extract(body, '$.due_date') IS NULL OR json_extract(body, '$.due_date') <= ?) AND 0"
        );
        assert_eq!(
            params,
            vec![
                SqlValue::Text("job".to_string()),
                SqlValue::Integer(1),
                SqlValue::Integer(10)
            ]
        );
    }

    #[test]
    fn test_to_sql_scalars() {
        assert_eq!(to_sql(&json!(null)), SqlValue::Null);
        assert_eq!(to_sql(&json!(false)), SqlValue::Integer(0));
        assert_eq!(to_sql(&json!(1.5)), SqlValue::Real(1.5));
        assert_eq!(to_sql(&json!("a")), SqlValue::Text("a".to_string()));
    }
}
