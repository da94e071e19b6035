use super::{decode_rows, Criteria, Database, Page};
use crate::cache::EntityKind;
use crate::errors::Result;
use crate::model::{Job, JobKind};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Filter for job listing and counting
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobQuery {
    pub kind: Option<JobKind>,
    pub execution_id: Option<String>,
    pub process_instance_id: Option<String>,
    pub process_definition_id: Option<String>,
    pub element_id: Option<String>,
    pub handler_type: Option<String>,
    pub tenant_id: Option<String>,
    pub without_tenant: bool,
    pub with_exception: bool,
    pub locked: Option<bool>,
    pub due_before: Option<DateTime<Utc>>,
}

impl JobQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: JobKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn execution_id(mut self, id: impl Into<String>) -> Self {
        self.execution_id = Some(id.into());
        self
    }

    pub fn process_instance_id(mut self, id: impl Into<String>) -> Self {
        self.process_instance_id = Some(id.into());
        self
    }

    pub fn handler_type(mut self, handler_type: impl Into<String>) -> Self {
        self.handler_type = Some(handler_type.into());
        self
    }

    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_exception(mut self) -> Self {
        self.with_exception = true;
        self
    }

    pub fn to_criteria(&self) -> Criteria {
        let mut c = Criteria::new();
        if let Some(kind) = self.kind {
            c = c.eq("kind", kind.as_str());
        }
        let exact = [
            ("execution_id", &self.execution_id),
            ("process_instance_id", &self.process_instance_id),
            ("process_definition_id", &self.process_definition_id),
            ("element_id", &self.element_id),
            ("handler_type", &self.handler_type),
            ("tenant_id", &self.tenant_id),
        ];
        for (field, value) in exact {
            if let Some(v) = value {
                c = c.eq(field, v.as_str());
            }
        }
        if self.without_tenant {
            c = c.is_null("tenant_id");
        }
        if self.with_exception {
            c = c.not_null("exception_message");
        }
        match self.locked {
            Some(true) => c = c.not_null("lock_owner"),
            Some(false) => c = c.is_null("lock_owner"),
            None => {}
        }
        if let Some(due) = self.due_before {
            c = c.lt("due_date", due.timestamp_millis());
        }
        c.order_asc("create_time")
    }
}

/// Typed job reads over a `Database`
///
/// Results are raw database state; callers inside a unit of work reconcile
/// them with the entity cache.
pub struct JobDataManager<'a> {
    db: &'a dyn Database,
}

impl<'a> JobDataManager<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        Self { db }
    }

    fn select(&self, criteria: &Criteria) -> Result<Vec<Job>> {
        decode_rows(self.db.select(EntityKind::Job, criteria)?)
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<Job>> {
        self.db
            .find(EntityKind::Job, id)?
            .map(|row| serde_json::from_value(row).map_err(Into::into))
            .transpose()
    }

    /// Unlocked jobs of `kind` whose due date has passed (or is unset)
    pub fn find_jobs_to_execute(&self, kind: JobKind, now: DateTime<Utc>, page: Page) -> Result<Vec<Job>> {
        self.select(
            &Criteria::new()
                .eq("kind", kind.as_str())
                .is_null("lock_owner")
                .null_or_le("due_date", now.timestamp_millis())
                .order_asc("due_date")
                .order_asc("create_time")
                .with_page(page),
        )
    }

    /// Locked executable or history jobs whose lock expired before `now`
    pub fn find_expired(&self, now: DateTime<Utc>, page: Page) -> Result<Vec<Job>> {
        self.select(
            &Criteria::new()
                .is_in(
                    "kind",
                    vec![
                        Value::from(JobKind::Async.as_str()),
                        Value::from(JobKind::History.as_str()),
                    ],
                )
                .not_null("lock_owner")
                .lt("lock_expiration_time", now.timestamp_millis())
                .order_asc("lock_expiration_time")
                .with_page(page),
        )
    }

    pub fn find_due_timers(&self, now: DateTime<Utc>, page: Page) -> Result<Vec<Job>> {
        self.select(
            &Criteria::new()
                .eq("kind", JobKind::Timer.as_str())
                .le("due_date", now.timestamp_millis())
                .order_asc("due_date")
                .with_page(page),
        )
    }

    pub fn find_by_execution_id(&self, execution_id: &str) -> Result<Vec<Job>> {
        self.select(
            &Criteria::new()
                .eq("execution_id", execution_id)
                .order_asc("create_time"),
        )
    }

    pub fn find_by_process_instance_id(&self, process_instance_id: &str) -> Result<Vec<Job>> {
        self.select(
            &Criteria::new()
                .eq("process_instance_id", process_instance_id)
                .order_asc("create_time"),
        )
    }

    pub fn find_by_deployment_id(&self, deployment_id: &str) -> Result<Vec<Job>> {
        self.select(&Criteria::new().eq("deployment_id", deployment_id))
    }

    /// Exclusive jobs of a process instance currently held by some executor
    pub fn count_locked_exclusive(&self, process_instance_id: &str) -> Result<u64> {
        self.db.count(
            EntityKind::Job,
            &Criteria::new()
                .eq("process_instance_id", process_instance_id)
                .eq("exclusive", true)
                .not_null("lock_owner"),
        )
    }

    pub fn find_by_query_criteria(&self, query: &JobQuery, page: Option<Page>) -> Result<Vec<Job>> {
        let mut criteria = query.to_criteria();
        criteria.page = page;
        self.select(&criteria)
    }

    pub fn count_by_query_criteria(&self, query: &JobQuery) -> Result<u64> {
        self.db
            .count(EntityKind::Job, &query.to_criteria().without_page())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{FlushOp, MemoryDatabase};
    use chrono::Duration;

    fn store(db: &MemoryDatabase, job: &Job) {
        db.flush(&[FlushOp::Insert {
            kind: EntityKind::Job,
            id: job.id.clone(),
            body: serde_json::to_value(job).unwrap(),
        }])
        .unwrap();
    }

    #[test]
    fn test_jobs_to_execute_skip_locked_and_future() {
        let db = MemoryDatabase::new();
        let now = Utc::now();
        store(&db, &Job::new("due", JobKind::Async, "h"));
        store(
            &db,
            &Job::new("future", JobKind::Async, "h").with_due_date(now + Duration::hours(1)),
        );
        let mut locked = Job::new("locked", JobKind::Async, "h");
        locked.lock_owner = Some("node-a".to_string());
        store(&db, &locked);
        store(&db, &Job::new("timer", JobKind::Timer, "h"));

        let found = JobDataManager::new(&db)
            .find_jobs_to_execute(JobKind::Async, now, Page::first(10))
            .unwrap();
        let ids: Vec<_> = found.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["due"]);
    }

    #[test]
    fn test_find_expired_uses_lock_expiration() {
        let db = MemoryDatabase::new();
        let now = Utc::now();
        let mut expired = Job::new("expired", JobKind::Async, "h");
        expired.lock_owner = Some("node-a".to_string());
        expired.lock_expiration_time = Some(now - Duration::minutes(1));
        store(&db, &expired);
        let mut held = Job::new("held", JobKind::History, "h");
        held.lock_owner = Some("node-b".to_string());
        held.lock_expiration_time = Some(now + Duration::minutes(1));
        store(&db, &held);

        let found = JobDataManager::new(&db)
            .find_expired(now, Page::first(10))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "expired");
    }

    #[test]
    fn test_query_and_count_agree() {
        let db = MemoryDatabase::new();
        store(&db, &Job::new("a", JobKind::Async, "h").with_process_instance_id("p1"));
        store(&db, &Job::new("b", JobKind::Timer, "h").with_process_instance_id("p1"));
        store(&db, &Job::new("c", JobKind::Async, "h").with_process_instance_id("p2"));

        let dm = JobDataManager::new(&db);
        let query = JobQuery::new().process_instance_id("p1");
        assert_eq!(dm.find_by_query_criteria(&query, None).unwrap().len(), 2);
        assert_eq!(dm.count_by_query_criteria(&query).unwrap(), 2);

        let paged = dm
            .find_by_query_criteria(&query.clone().kind(JobKind::Timer), Some(Page::first(5)))
            .unwrap();
        assert_eq!(paged[0].id, "b");
    }
}
