//! Cache retention policies for query reconciliation

/// Decides whether a cached entity missing from the raw query rows belongs in
/// the final result
///
/// `db_rows` is `None` when the caller consults the cache only. `cached` holds
/// every live (non-deleted) entity of the same kind in the unit of work.
/// Implementations must be stateless so one instance can serve every context.
pub trait CachedEntityMatcher<E, P: ?Sized>: Send + Sync {
    fn is_retained(&self, db_rows: Option<&[E]>, cached: &[&E], candidate: &E, param: &P) -> bool;
}

/// Never retains cached entities; the result is exactly the database rows
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCacheMatch;

impl<E, P: ?Sized> CachedEntityMatcher<E, P> for NoCacheMatch {
    fn is_retained(&self, _: Option<&[E]>, _: &[&E], _: &E, _: &P) -> bool {
        false
    }
}

/// Adapter for the common case where only the candidate and the query
/// parameter matter
pub struct MatchFn<F>(pub F);

impl<E, P, F> CachedEntityMatcher<E, P> for MatchFn<F>
where
    P: ?Sized,
    F: Fn(&E, &P) -> bool + Send + Sync,
{
    fn is_retained(&self, _: Option<&[E]>, _: &[&E], candidate: &E, param: &P) -> bool {
        (self.0)(candidate, param)
    }
}
