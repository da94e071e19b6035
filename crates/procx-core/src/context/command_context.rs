use super::EngineServices;
use crate::agenda::{Agenda, Operation, OperationOutcome};
use crate::cache::{
    reconcile, CacheState, CachedEntityMatcher, Entity, EntityCache, EntityKind, TypedCache,
};
use crate::config::EngineConfig;
use crate::errors::{ProcxError, Result};
use crate::events::EngineEvent;
use crate::history::HistoryManager;
use crate::model::{ByteArray, ByteArrayRef, Execution, HistoricActivityInstance, HistoricTaskInstance, Job, JobKind};
use crate::persistence::{Criteria, FlushOp};
use crate::process::{require_definition, ProcessDefinition};
use chrono::{DateTime, Utc};
use procx_core_types::{DiagnosticContext, RequestContext};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Handler type of the jobs that carry queued history facts
pub const ASYNC_HISTORY_HANDLER: &str = "async-history";

/// Name of the byte arrays holding history job payloads
pub const HISTORY_PAYLOAD_NAME: &str = "hist.job.data";

/// Counts of the writes made by one commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub history_jobs: usize,
}

impl CommitSummary {
    pub fn is_empty(&self) -> bool {
        self.inserted + self.updated + self.deleted == 0
    }
}

/// One unit of work
///
/// Owns the entity cache, the agenda and the pending history facts of a
/// single command. Confined to one thread; nothing in it is visible to other
/// units of work until `commit` flushes it to the database.
pub struct CommandContext {
    services: Arc<EngineServices>,
    cache: EntityCache,
    agenda: Agenda,
    history: HistoryManager,
    diagnostics: DiagnosticContext,
    request: RequestContext,
    closed: bool,
}

impl CommandContext {
    pub fn new(services: Arc<EngineServices>, request: RequestContext) -> Self {
        let history = HistoryManager::new(services.config.async_history_enabled);
        Self {
            services,
            cache: EntityCache::new(),
            agenda: Agenda::new(),
            history,
            diagnostics: DiagnosticContext::new(),
            request,
            closed: false,
        }
    }

    pub fn services(&self) -> &Arc<EngineServices> {
        &self.services
    }

    pub fn config(&self) -> &EngineConfig {
        &self.services.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.services.clock.now()
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub fn agenda(&self) -> &Agenda {
        &self.agenda
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryManager {
        &mut self.history
    }

    pub fn diagnostics(&self) -> &DiagnosticContext {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut DiagnosticContext {
        &mut self.diagnostics
    }

    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Fresh, time-ordered entity identifier
    pub fn new_id(&self) -> String {
        Uuid::now_v7().to_string()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(ProcxError::ContextClosed)
        } else {
            Ok(())
        }
    }

    // ===== Entities =====

    fn load<E: Entity>(&mut self, id: &str) -> Result<()> {
        self.ensure_open()?;
        if self.cache.contains::<E>(id).is_some() {
            return Ok(());
        }
        if let Some(body) = self.services.database.find(E::KIND, id)? {
            let entity: E = serde_json::from_value(body.clone())?;
            self.cache.typed_mut::<E>().put_loaded(entity, body);
        }
        Ok(())
    }

    /// Entity by id, consulting the cache before the database
    ///
    /// Repeated lookups of the same id return the same cached instance. An
    /// entity deleted earlier in this unit of work is reported as absent.
    pub fn find_by_id<E: Entity>(&mut self, id: &str) -> Result<Option<&E>> {
        self.load::<E>(id)?;
        Ok(self
            .cache
            .contains::<E>(id)
            .filter(|entry| !entry.is_deleted())
            .map(|entry| entry.entity()))
    }

    /// Like `find_by_id`, marking the entity as updated
    pub fn find_by_id_mut<E: Entity>(&mut self, id: &str) -> Result<Option<&mut E>> {
        self.load::<E>(id)?;
        Ok(self
            .cache
            .typed_mut::<E>()
            .get_mut(id)
            .filter(|entry| !entry.is_deleted())
            .map(|entry| entry.entity_mut()))
    }

    pub fn require<E: Entity>(&mut self, id: &str) -> Result<&E> {
        self.find_by_id::<E>(id)?
            .ok_or_else(|| ProcxError::not_found(E::KIND.as_str(), id))
    }

    pub fn require_mut<E: Entity>(&mut self, id: &str) -> Result<&mut E> {
        self.find_by_id_mut::<E>(id)?
            .ok_or_else(|| ProcxError::not_found(E::KIND.as_str(), id))
    }

    /// Register a new entity; it is inserted at commit
    pub fn insert<E: Entity>(&mut self, entity: E) -> Result<()> {
        self.ensure_open()?;
        self.cache.typed_mut::<E>().put_new(entity)
    }

    /// Delete an entity; returns `false` if it does not exist
    ///
    /// An entity created in this unit of work is simply forgotten.
    pub fn delete<E: Entity>(&mut self, id: &str) -> Result<bool> {
        if self.find_by_id::<E>(id)?.is_none() {
            return Ok(false);
        }
        let typed = self.cache.typed_mut::<E>();
        let transient = typed
            .get(id)
            .map_or(false, |entry| entry.state() == CacheState::Transient);
        if transient {
            typed.remove(id);
        } else if let Some(entry) = typed.get_mut(id) {
            entry.mark_deleted();
        }
        Ok(true)
    }

    /// Query the database and reconcile the rows with this unit of work
    ///
    /// Rows already cached are replaced by the cached instance, rows deleted
    /// in this unit of work are dropped, and cached entities missing from the
    /// rows are added when `matcher` retains them.
    pub fn select<E, P, M>(&mut self, criteria: &Criteria, matcher: &M, param: &P) -> Result<Vec<E>>
    where
        E: Entity,
        P: ?Sized,
        M: CachedEntityMatcher<E, P> + ?Sized,
    {
        self.ensure_open()?;
        let rows = self.services.database.select(E::KIND, criteria)?;
        let mut entities = Vec::with_capacity(rows.len());
        for body in rows {
            let entity: E = serde_json::from_value(body.clone())?;
            entities.push(entity.clone());
            self.cache.typed_mut::<E>().put_loaded(entity, body);
        }
        Ok(reconcile(Some(entities), self.cache.typed::<E>(), matcher, param))
    }

    /// Reconcile rows fetched elsewhere (e.g. through a data manager)
    ///
    /// The rows are not added to the cache.
    pub fn reconcile_rows<E, P, M>(&self, rows: Option<Vec<E>>, matcher: &M, param: &P) -> Vec<E>
    where
        E: Entity,
        P: ?Sized,
        M: CachedEntityMatcher<E, P> + ?Sized,
    {
        reconcile(rows, self.cache.typed::<E>(), matcher, param)
    }

    /// Raw database count; does not see unflushed changes
    pub fn count<E: Entity>(&self, criteria: &Criteria) -> Result<u64> {
        self.ensure_open()?;
        self.services.database.count(E::KIND, criteria)
    }

    // ===== Process model =====

    pub fn process_definition(&self, id: &str) -> Result<Arc<ProcessDefinition>> {
        require_definition(self.services.process_definitions.as_ref(), id)
    }

    // ===== Variables =====

    /// Variable visible from `execution_id`, walking up the parent chain
    pub fn get_variable(&mut self, execution_id: &str, name: &str) -> Result<Option<Value>> {
        let mut current = Some(execution_id.to_string());
        while let Some(id) = current {
            let execution = self.require::<Execution>(&id)?;
            if let Some(value) = execution.get_variable_local(name) {
                return Ok(Some(value.clone()));
            }
            current = execution.parent_id.clone();
        }
        Ok(None)
    }

    pub fn set_variable_local(&mut self, execution_id: &str, name: &str, value: Value) -> Result<()> {
        self.require_mut::<Execution>(execution_id)?
            .set_variable_local(name, value);
        Ok(())
    }

    /// Set on the nearest execution already defining `name`, otherwise on the
    /// process instance
    pub fn set_variable(&mut self, execution_id: &str, name: &str, value: Value) -> Result<()> {
        let mut current = Some(execution_id.to_string());
        let mut target = None;
        let mut root = execution_id.to_string();
        while let Some(id) = current {
            let execution = self.require::<Execution>(&id)?;
            if execution.has_variable_local(name) {
                target = Some(id);
                break;
            }
            root = execution.process_instance_id.clone();
            current = execution.parent_id.clone();
        }
        let target = target.unwrap_or(root);
        self.set_variable_local(&target, name, value)
    }

    // ===== Events & agenda =====

    /// Dispatch `event` if the dispatcher is enabled
    pub fn fire(&self, event: EngineEvent) {
        let dispatcher = &self.services.event_dispatcher;
        if dispatcher.is_enabled() {
            dispatcher.dispatch_event(&event);
        }
    }

    pub fn event_dispatcher_enabled(&self) -> bool {
        self.services.event_dispatcher.is_enabled()
    }

    /// Append an operation to the tail of the agenda
    pub fn plan(&mut self, operation: Operation) {
        self.agenda.append(operation);
    }

    /// Run operations from the head of the agenda until it is empty
    pub fn run_agenda(&mut self) -> Result<()> {
        self.ensure_open()?;
        while let Some(operation) = self.agenda.next() {
            let name = operation.name().to_string();
            let outcome = operation.run(self)?;
            if let OperationOutcome::Deferred { job_id } = &outcome {
                tracing::debug!(operation = %name, job_id = %job_id, "operation deferred to job");
            }
            self.agenda.record(name, outcome);
        }
        Ok(())
    }

    // ===== Transaction =====

    /// Flush every change of this unit of work in one atomic database write
    ///
    /// Pending history facts are first queued as one history job. Inserts and
    /// updates run per kind in `EntityKind::FLUSH_ORDER`, deletes afterwards in
    /// the reverse order. Updates and deletes are conditioned on the revision
    /// loaded; a conflict fails the whole flush with `OptimisticLock`.
    pub fn commit(&mut self) -> Result<CommitSummary> {
        self.ensure_open()?;
        let history_jobs = self.queue_history_job()?;

        let mut writes = Vec::new();
        let mut deletes_by_kind: Vec<Vec<FlushOp>> = Vec::new();
        let mut summary = CommitSummary {
            history_jobs,
            ..CommitSummary::default()
        };
        for kind in EntityKind::FLUSH_ORDER {
            let mut deletes = Vec::new();
            match kind {
                EntityKind::ByteArray => {
                    plan_flush(self.cache.typed::<ByteArray>(), &mut writes, &mut deletes, &mut summary)?
                }
                EntityKind::Execution => {
                    plan_flush(self.cache.typed::<Execution>(), &mut writes, &mut deletes, &mut summary)?
                }
                EntityKind::Job => {
                    plan_flush(self.cache.typed::<Job>(), &mut writes, &mut deletes, &mut summary)?
                }
                EntityKind::HistoricActivityInstance => plan_flush(
                    self.cache.typed::<HistoricActivityInstance>(),
                    &mut writes,
                    &mut deletes,
                    &mut summary,
                )?,
                EntityKind::HistoricTaskInstance => plan_flush(
                    self.cache.typed::<HistoricTaskInstance>(),
                    &mut writes,
                    &mut deletes,
                    &mut summary,
                )?,
            }
            deletes_by_kind.push(deletes);
        }
        writes.extend(deletes_by_kind.into_iter().rev().flatten());

        if !writes.is_empty() {
            self.services.database.flush(&writes)?;
        }
        self.closed = true;
        tracing::debug!(
            request_id = %self.request.request_id,
            inserted = summary.inserted,
            updated = summary.updated,
            deleted = summary.deleted,
            history_jobs = summary.history_jobs,
            "unit of work committed"
        );
        Ok(summary)
    }

    /// Discard every buffered change
    pub fn rollback(&mut self) {
        self.cache = EntityCache::new();
        self.agenda.clear();
        self.history.clear();
        self.closed = true;
        tracing::debug!(request_id = %self.request.request_id, "unit of work rolled back");
    }

    fn queue_history_job(&mut self) -> Result<usize> {
        let facts = self.history.take_pending();
        if facts.is_empty() {
            return Ok(0);
        }
        let payload = serde_json::to_vec(&Value::Array(facts))?;
        let payload_ref = ByteArrayRef::create(self, HISTORY_PAYLOAD_NAME, payload)?;
        let mut job = Job::new(self.new_id(), JobKind::History, ASYNC_HISTORY_HANDLER)
            .with_exclusive(false)
            .with_retries(self.config().default_job_retries);
        job.custom_values = Some(payload_ref);
        job.create_time = Some(self.now());
        self.insert(job)?;
        Ok(1)
    }
}

fn plan_flush<E: Entity>(
    cache: &TypedCache<E>,
    writes: &mut Vec<FlushOp>,
    deletes: &mut Vec<FlushOp>,
    summary: &mut CommitSummary,
) -> Result<()> {
    for entry in cache.entries() {
        let entity = entry.entity();
        match entry.state() {
            CacheState::Persistent => {}
            CacheState::Transient => {
                let mut row = entity.clone();
                row.set_revision(1);
                writes.push(FlushOp::Insert {
                    kind: E::KIND,
                    id: entity.id().to_string(),
                    body: serde_json::to_value(&row)?,
                });
                summary.inserted += 1;
            }
            CacheState::Updated => {
                let body = serde_json::to_value(entity)?;
                if entry.snapshot() == Some(&body) {
                    continue;
                }
                let expected = entry.loaded_revision().unwrap_or_else(|| entity.revision());
                let mut row = entity.clone();
                row.set_revision(expected + 1);
                writes.push(FlushOp::Update {
                    kind: E::KIND,
                    id: entity.id().to_string(),
                    expected_revision: expected,
                    body: serde_json::to_value(&row)?,
                });
                summary.updated += 1;
            }
            CacheState::Deleted => {
                deletes.push(FlushOp::Delete {
                    kind: E::KIND,
                    id: entity.id().to_string(),
                    expected_revision: entry.loaded_revision().unwrap_or_else(|| entity.revision()),
                });
                summary.deleted += 1;
            }
        }
    }
    Ok(())
}
