use super::{EntityCache, TypedCache};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Persisted entity kinds, in insert order
///
/// Byte arrays come first because jobs reference them; executions before jobs
/// because jobs link to executions. Deletes run in the reverse order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    ByteArray,
    Execution,
    Job,
    HistoricActivityInstance,
    HistoricTaskInstance,
}

impl EntityKind {
    pub const FLUSH_ORDER: [EntityKind; 5] = [
        EntityKind::ByteArray,
        EntityKind::Execution,
        EntityKind::Job,
        EntityKind::HistoricActivityInstance,
        EntityKind::HistoricTaskInstance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::ByteArray => "byte_array",
            EntityKind::Execution => "execution",
            EntityKind::Job => "job",
            EntityKind::HistoricActivityInstance => "historic_activity_instance",
            EntityKind::HistoricTaskInstance => "historic_task_instance",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::FLUSH_ORDER
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown entity kind: {}", s))
    }
}

/// A persisted domain object tracked by identity within a unit of work
pub trait Entity:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: EntityKind;

    fn id(&self) -> &str;

    /// Optimistic-lock revision; 0 until first flushed
    fn revision(&self) -> i64;

    fn set_revision(&mut self, revision: i64);

    fn cache(cache: &EntityCache) -> &TypedCache<Self>;

    fn cache_mut(cache: &mut EntityCache) -> &mut TypedCache<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in EntityKind::FLUSH_ORDER {
            assert_eq!(kind.as_str().parse::<EntityKind>(), Ok(kind));
        }
        assert!("task".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_flush_order_is_sorted() {
        let mut sorted = EntityKind::FLUSH_ORDER;
        sorted.sort();
        assert_eq!(sorted, EntityKind::FLUSH_ORDER);
    }
}
