use super::{CachedEntityMatcher, Entity, TypedCache};
use std::collections::HashSet;

/// Combine raw query rows with the cache of the current unit of work
///
/// - a row whose id is cached as deleted is dropped
/// - a row whose id is cached otherwise is replaced by the cached instance
/// - a live cached entity absent from the rows is added when `matcher` retains it
///
/// Row order is preserved; retained cache-only entities follow in id order.
pub fn reconcile<E, P, M>(
    db_rows: Option<Vec<E>>,
    cache: &TypedCache<E>,
    matcher: &M,
    param: &P,
) -> Vec<E>
where
    E: Entity,
    P: ?Sized,
    M: CachedEntityMatcher<E, P> + ?Sized,
{
    let live: Vec<&E> = cache.live().collect();
    let row_ids: HashSet<String> = db_rows
        .iter()
        .flatten()
        .map(|r| r.id().to_string())
        .collect();

    let mut result: Vec<E> = Vec::with_capacity(row_ids.len());
    for row in db_rows.iter().flatten() {
        match cache.get(row.id()) {
            Some(entry) if entry.is_deleted() => {}
            Some(entry) => result.push(entry.entity().clone()),
            None => result.push(row.clone()),
        }
    }

    for candidate in &live {
        if row_ids.contains(candidate.id()) {
            continue;
        }
        if matcher.is_retained(db_rows.as_deref(), &live, candidate, param) {
            result.push((*candidate).clone());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MatchFn, NoCacheMatch};
    use crate::model::{Job, JobKind};

    fn job(id: &str, execution_id: &str) -> Job {
        Job::new(id, JobKind::Async, "async-continuation").with_execution_id(execution_id)
    }

    fn loaded(cache: &mut TypedCache<Job>, j: Job) {
        let body = serde_json::to_value(&j).unwrap();
        cache.put_loaded(j, body);
    }

    #[test]
    fn test_deleted_cache_entry_hides_row() {
        let mut cache = TypedCache::default();
        loaded(&mut cache, job("j1", "e1"));
        cache.get_mut("j1").unwrap().mark_deleted();

        let result = reconcile(Some(vec![job("j1", "e1"), job("j2", "e1")]), &cache, &NoCacheMatch, "e1");

        let ids: Vec<_> = result.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["j2"]);
    }

    #[test]
    fn test_transient_entry_added_only_when_retained() {
        let mut cache = TypedCache::default();
        cache.put_new(job("new-1", "e1")).unwrap();
        cache.put_new(job("new-2", "e2")).unwrap();

        let matcher = MatchFn(|j: &Job, exec: &str| j.execution_id.as_deref() == Some(exec));
        let result = reconcile(Some(vec![job("j1", "e1")]), &cache, &matcher, "e1");

        let ids: Vec<_> = result.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["j1", "new-1"]);
    }

    #[test]
    fn test_cached_instance_replaces_row() {
        let mut cache = TypedCache::default();
        loaded(&mut cache, job("j1", "e1"));
        cache.get_mut("j1").unwrap().entity_mut().retries = 0;

        let result = reconcile(Some(vec![job("j1", "e1")]), &cache, &NoCacheMatch, "e1");
        assert_eq!(result[0].retries, 0);
    }

    #[test]
    fn test_cache_only_lookup_passes_none_rows() {
        let mut cache = TypedCache::default();
        cache.put_new(job("j1", "e1")).unwrap();

        struct RequiresNoRows;
        impl CachedEntityMatcher<Job, str> for RequiresNoRows {
            fn is_retained(&self, db_rows: Option<&[Job]>, cached: &[&Job], _: &Job, _: &str) -> bool {
                db_rows.is_none() && cached.len() == 1
            }
        }

        let result = reconcile(None, &cache, &RequiresNoRows, "e1");
        assert_eq!(result.len(), 1);
    }
}
