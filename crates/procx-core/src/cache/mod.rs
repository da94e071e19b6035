//! Per-unit-of-work entity cache
//!
//! Holds every entity loaded, created or deleted during one command. A second
//! load of the same (kind, id) returns the cached instance; query results are
//! reconciled against the cache so unflushed inserts and deletes are visible to
//! the unit of work that made them.

mod entity;
pub mod matcher;
mod reconcile;
mod typed;

pub use entity::{Entity, EntityKind};
pub use matcher::{CachedEntityMatcher, MatchFn, NoCacheMatch};
pub use reconcile::reconcile;
pub use typed::{CacheState, CachedEntity, TypedCache};

use crate::model::{ByteArray, Execution, HistoricActivityInstance, HistoricTaskInstance, Job};

/// One typed cache per entity kind
#[derive(Debug, Default)]
pub struct EntityCache {
    byte_arrays: TypedCache<ByteArray>,
    executions: TypedCache<Execution>,
    jobs: TypedCache<Job>,
    historic_activities: TypedCache<HistoricActivityInstance>,
    historic_tasks: TypedCache<HistoricTaskInstance>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn typed<E: Entity>(&self) -> &TypedCache<E> {
        E::cache(self)
    }

    pub fn typed_mut<E: Entity>(&mut self) -> &mut TypedCache<E> {
        E::cache_mut(self)
    }

    /// Cached entry for (E::KIND, id), in any state
    pub fn contains<E: Entity>(&self, id: &str) -> Option<&CachedEntity<E>> {
        self.typed::<E>().get(id)
    }

    pub fn remove<E: Entity>(&mut self, id: &str) -> Option<CachedEntity<E>> {
        self.typed_mut::<E>().remove(id)
    }

    /// Number of entries across all kinds
    pub fn len(&self) -> usize {
        self.byte_arrays.len()
            + self.executions.len()
            + self.jobs.len()
            + self.historic_activities.len()
            + self.historic_tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

macro_rules! impl_entity {
    ($ty:ty, $kind:expr, $field:ident) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn revision(&self) -> i64 {
                self.revision
            }

            fn set_revision(&mut self, revision: i64) {
                self.revision = revision;
            }

            fn cache(cache: &EntityCache) -> &TypedCache<Self> {
                &cache.$field
            }

            fn cache_mut(cache: &mut EntityCache) -> &mut TypedCache<Self> {
                &mut cache.$field
            }
        }
    };
}

impl_entity!(ByteArray, EntityKind::ByteArray, byte_arrays);
impl_entity!(Execution, EntityKind::Execution, executions);
impl_entity!(Job, EntityKind::Job, jobs);
impl_entity!(
    HistoricActivityInstance,
    EntityKind::HistoricActivityInstance,
    historic_activities
);
impl_entity!(
    HistoricTaskInstance,
    EntityKind::HistoricTaskInstance,
    historic_tasks
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_caches_are_separate_per_kind() {
        let mut cache = EntityCache::new();
        cache
            .typed_mut::<Execution>()
            .put_new(Execution::new_process_instance("x1", "def:1"))
            .unwrap();
        cache
            .typed_mut::<Job>()
            .put_new(Job::new("x1", crate::model::JobKind::Async, "async-continuation"))
            .unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains::<Execution>("x1").is_some());
        assert!(cache.contains::<Job>("x1").is_some());
        assert!(cache.contains::<ByteArray>("x1").is_none());

        cache.remove::<Job>("x1");
        assert!(cache.contains::<Job>("x1").is_none());
        assert!(cache.contains::<Execution>("x1").is_some());
    }
}
