use super::Entity;
use crate::errors::{ProcxError, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// Lifecycle state of a cached entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Matches the last known database state
    Persistent,
    /// Loaded, then handed out for mutation
    Updated,
    /// Loaded, then deleted; hidden from lookups and queries
    Deleted,
    /// Created in this unit of work, not yet flushed
    Transient,
}

#[derive(Debug, Clone)]
pub struct CachedEntity<E> {
    entity: E,
    state: CacheState,
    /// Body as loaded; `None` for transient entries
    snapshot: Option<Value>,
}

impl<E: Entity> CachedEntity<E> {
    pub fn entity(&self) -> &E {
        &self.entity
    }

    pub(crate) fn entity_mut(&mut self) -> &mut E {
        if self.state == CacheState::Persistent {
            self.state = CacheState::Updated;
        }
        &mut self.entity
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn is_deleted(&self) -> bool {
        self.state == CacheState::Deleted
    }

    /// Revision observed when the entity was loaded
    pub fn loaded_revision(&self) -> Option<i64> {
        self.snapshot
            .as_ref()
            .and_then(|s| s.get("revision"))
            .and_then(Value::as_i64)
    }

    pub(crate) fn snapshot(&self) -> Option<&Value> {
        self.snapshot.as_ref()
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.state = CacheState::Deleted;
    }
}

/// Cache for a single entity kind, keyed by identifier
#[derive(Debug)]
pub struct TypedCache<E> {
    entries: BTreeMap<String, CachedEntity<E>>,
}

impl<E> Default for TypedCache<E> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<E: Entity> TypedCache<E> {
    pub fn get(&self, id: &str) -> Option<&CachedEntity<E>> {
        self.entries.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut CachedEntity<E>> {
        self.entries.get_mut(id)
    }

    /// Cache an entity read from the database
    ///
    /// If the id is already cached the existing entry wins and the fresh row
    /// is dropped.
    pub fn put_loaded(&mut self, entity: E, body: Value) -> &CachedEntity<E> {
        self.entries
            .entry(entity.id().to_string())
            .or_insert(CachedEntity {
                entity,
                state: CacheState::Persistent,
                snapshot: Some(body),
            })
    }

    /// Cache a newly created entity
    ///
    /// Re-creating an id deleted earlier in the same unit of work turns the
    /// delete into an update of the stored row.
    pub fn put_new(&mut self, entity: E) -> Result<()> {
        let id = entity.id().to_string();
        match self.entries.get_mut(&id) {
            Some(existing) if existing.is_deleted() => {
                existing.entity = entity;
                existing.state = CacheState::Updated;
                Ok(())
            }
            Some(_) => Err(ProcxError::AlreadyExists {
                kind: E::KIND.to_string(),
                id,
            }),
            None => {
                self.entries.insert(
                    id,
                    CachedEntity {
                        entity,
                        state: CacheState::Transient,
                        snapshot: None,
                    },
                );
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<CachedEntity<E>> {
        self.entries.remove(id)
    }

    /// All entries, including deleted ones
    pub fn entries(&self) -> impl Iterator<Item = &CachedEntity<E>> {
        self.entries.values()
    }

    /// Entities that are not logically deleted
    pub fn live(&self) -> impl Iterator<Item = &E> {
        self.entries
            .values()
            .filter(|e| !e.is_deleted())
            .map(|e| &e.entity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Execution;

    fn loaded(id: &str, revision: i64) -> (Execution, Value) {
        let mut e = Execution::new_process_instance(id, "def:1");
        e.revision = revision;
        let body = serde_json::to_value(&e).unwrap();
        (e, body)
    }

    #[test]
    fn test_put_loaded_keeps_first_instance() {
        let mut cache = TypedCache::<Execution>::default();
        let (e, body) = loaded("e1", 1);
        cache.put_loaded(e, body);
        cache
            .get_mut("e1")
            .unwrap()
            .entity_mut()
            .set_variable_local("x", 1.into());

        // GIVEN a fresh database row for the same id
        let (fresh, body) = loaded("e1", 2);
        let entry = cache.put_loaded(fresh, body);

        // THEN the mutated cached instance is kept
        assert_eq!(entry.state(), CacheState::Updated);
        assert_eq!(entry.loaded_revision(), Some(1));
        assert!(entry.entity().get_variable_local("x").is_some());
    }

    #[test]
    fn test_put_new_rejects_duplicate() {
        let mut cache = TypedCache::<Execution>::default();
        cache
            .put_new(Execution::new_process_instance("e1", "def:1"))
            .unwrap();
        let err = cache
            .put_new(Execution::new_process_instance("e1", "def:1"))
            .unwrap_err();
        assert!(matches!(err, ProcxError::AlreadyExists { .. }));
    }

    #[test]
    fn test_put_new_over_deleted_becomes_update() {
        let mut cache = TypedCache::<Execution>::default();
        let (e, body) = loaded("e1", 4);
        cache.put_loaded(e, body);
        cache.get_mut("e1").unwrap().mark_deleted();
        assert_eq!(cache.live().count(), 0);

        cache
            .put_new(Execution::new_process_instance("e1", "def:2"))
            .unwrap();
        let entry = cache.get("e1").unwrap();
        assert_eq!(entry.state(), CacheState::Updated);
        assert_eq!(entry.loaded_revision(), Some(4));
        assert_eq!(entry.entity().process_definition_id, "def:2");
    }

    #[test]
    fn test_entity_mut_keeps_transient_state() {
        let mut cache = TypedCache::<Execution>::default();
        cache
            .put_new(Execution::new_process_instance("e1", "def:1"))
            .unwrap();
        cache.get_mut("e1").unwrap().entity_mut().is_active = false;
        assert_eq!(cache.get("e1").unwrap().state(), CacheState::Transient);
    }
}
