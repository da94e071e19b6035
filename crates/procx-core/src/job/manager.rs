//! Job lifecycle inside a unit of work
//!
//! Every job insert and delete goes through this module so the execution
//! link, the tenant inheritance, the denormalized counters and the owned
//! byte arrays stay consistent with the job rows.

use super::timer::{RepeatExpression, TimerJobConfiguration};
use crate::cache::{CachedEntityMatcher, EntityKind, MatchFn, NoCacheMatch};
use crate::context::CommandContext;
use crate::errors::{ProcxError, Result};
use crate::events::EngineEvent;
use crate::model::{ByteArrayRef, Execution, Job, JobKind};
use crate::persistence::{JobDataManager, JobQuery, Page};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

pub const ASYNC_CONTINUATION: &str = "async-continuation";
pub const TRIGGER_TIMER: &str = "trigger-timer";

/// Name of the byte arrays holding failure details
pub const EXCEPTION_NAME: &str = "job.exceptionByteArray";

/// Longest exception message stored inline on a job
pub const MAX_EXCEPTION_MESSAGE_LENGTH: usize = 4000;

/// Retains cached jobs linked to the execution id passed as parameter
#[derive(Debug, Clone, Copy, Default)]
pub struct JobsByExecution;

impl CachedEntityMatcher<Job, str> for JobsByExecution {
    fn is_retained(&self, _: Option<&[Job]>, _: &[&Job], candidate: &Job, execution_id: &str) -> bool {
        candidate.execution_id.as_deref() == Some(execution_id)
    }
}

/// Retains cached jobs of the process instance id passed as parameter
#[derive(Debug, Clone, Copy, Default)]
pub struct JobsByProcessInstance;

impl CachedEntityMatcher<Job, str> for JobsByProcessInstance {
    fn is_retained(
        &self,
        _: Option<&[Job]>,
        _: &[&Job],
        candidate: &Job,
        process_instance_id: &str,
    ) -> bool {
        candidate.process_instance_id.as_deref() == Some(process_instance_id)
    }
}

fn data_manager(ctx: &CommandContext) -> JobDataManager<'_> {
    JobDataManager::new(ctx.services().database.as_ref())
}

// ===== Insert / delete =====

/// Insert `job`, linking it to its execution
///
/// When the job names an execution that does not exist, nothing is stored and
/// `false` is returned; the caller decides whether to retry or give up.
/// Otherwise the job id is appended to the execution's job list, the job
/// inherits the execution's tenant, and the execution's counter for the job
/// kind is incremented when counting is enabled.
pub fn insert(ctx: &mut CommandContext, mut job: Job, fire_create_event: bool) -> Result<bool> {
    let owner = match job.execution_id.clone() {
        Some(execution_id) => match ctx.find_by_id::<Execution>(&execution_id)? {
            Some(execution) => Some(execution.clone()),
            None => {
                tracing::warn!(
                    job_id = %job.id,
                    execution_id = %execution_id,
                    "owning execution not found; job not inserted"
                );
                return Ok(false);
            }
        },
        None => None,
    };

    if let Some(execution) = &owner {
        if let Some(tenant_id) = &execution.tenant_id {
            job.tenant_id = Some(tenant_id.clone());
        }
        if job.process_instance_id.is_none() {
            job.process_instance_id = Some(execution.process_instance_id.clone());
        }
        if job.process_definition_id.is_none() {
            job.process_definition_id = Some(execution.process_definition_id.clone());
        }
        ensure_jobs_loaded(ctx, &execution.id)?;
    }
    if job.create_time.is_none() {
        job.create_time = Some(ctx.now());
    }
    let id = job.id.clone();
    let kind = job.kind;

    // The execution is linked only once the job itself is registered
    ctx.insert(job)?;
    if let Some(execution) = owner {
        let counting = ctx.config().counting_enabled;
        let execution = ctx.require_mut::<Execution>(&execution.id)?;
        execution.jobs.get_or_insert_with(Vec::new).push(id.clone());
        if counting && execution.count_enabled {
            execution.increment_job_counter(kind);
        }
    }

    if fire_create_event {
        ctx.fire(EngineEvent::EntityCreated {
            kind: EntityKind::Job,
            id,
        });
    }
    Ok(true)
}

fn ensure_jobs_loaded(ctx: &mut CommandContext, execution_id: &str) -> Result<()> {
    let loaded = ctx
        .find_by_id::<Execution>(execution_id)?
        .map_or(true, |e| e.jobs.is_some());
    if loaded {
        return Ok(());
    }
    let ids: Vec<String> = find_by_execution(ctx, execution_id)?
        .into_iter()
        .map(|j| j.id)
        .collect();
    if let Some(execution) = ctx.find_by_id_mut::<Execution>(execution_id)? {
        execution.jobs = Some(ids);
    }
    Ok(())
}

/// Delete a job and everything it owns
///
/// Order: exception byte array, custom values byte array, execution link and
/// counter, job row, then the `EntityDeleted` event. A vanished owning
/// execution is tolerated.
pub fn delete(ctx: &mut CommandContext, job_id: &str, fire_delete_event: bool) -> Result<()> {
    let job = ctx.require::<Job>(job_id)?.clone();

    if let Some(exception) = &job.exception {
        exception.delete(ctx)?;
    }
    if let Some(custom_values) = &job.custom_values {
        custom_values.delete(ctx)?;
    }

    if let Some(execution_id) = &job.execution_id {
        let counting = ctx.config().counting_enabled;
        match ctx.find_by_id_mut::<Execution>(execution_id)? {
            Some(execution) => {
                if let Some(jobs) = execution.jobs.as_mut() {
                    jobs.retain(|id| id != &job.id);
                }
                if counting && execution.count_enabled {
                    execution.decrement_job_counter(job.kind);
                }
            }
            None => tracing::debug!(
                job_id = %job.id,
                execution_id = %execution_id,
                "owning execution already deleted"
            ),
        }
    }

    ctx.delete::<Job>(&job.id)?;
    if fire_delete_event {
        ctx.fire(EngineEvent::EntityDeleted {
            kind: EntityKind::Job,
            id: job.id,
        });
    }
    Ok(())
}

// ===== Reads =====

/// Unlocked jobs of `kind` due at the current time
pub fn find_due(ctx: &mut CommandContext, kind: JobKind, page: Page) -> Result<Vec<Job>> {
    let now = ctx.now();
    let rows = data_manager(ctx).find_jobs_to_execute(kind, now, page)?;
    Ok(ctx.reconcile_rows(Some(rows), &NoCacheMatch, &()))
}

/// Locked jobs whose lock expired
pub fn find_expired(ctx: &mut CommandContext, page: Page) -> Result<Vec<Job>> {
    let now = ctx.now();
    let rows = data_manager(ctx).find_expired(now, page)?;
    Ok(ctx.reconcile_rows(Some(rows), &NoCacheMatch, &()))
}

/// Timers whose due date has passed
pub fn find_due_timers(ctx: &mut CommandContext, page: Page) -> Result<Vec<Job>> {
    let now = ctx.now();
    let rows = data_manager(ctx).find_due_timers(now, page)?;
    Ok(ctx.reconcile_rows(Some(rows), &NoCacheMatch, &()))
}

/// Jobs linked to an execution, including ones created in this unit of work
pub fn find_by_execution(ctx: &mut CommandContext, execution_id: &str) -> Result<Vec<Job>> {
    let rows = data_manager(ctx).find_by_execution_id(execution_id)?;
    Ok(ctx.reconcile_rows(Some(rows), &JobsByExecution, execution_id))
}

pub fn find_by_process_instance(ctx: &mut CommandContext, process_instance_id: &str) -> Result<Vec<Job>> {
    let rows = data_manager(ctx).find_by_process_instance_id(process_instance_id)?;
    Ok(ctx.reconcile_rows(Some(rows), &JobsByProcessInstance, process_instance_id))
}

/// Stored jobs matching `query`; unflushed changes are not visible
pub fn query(ctx: &CommandContext, query: &JobQuery, page: Option<Page>) -> Result<Vec<Job>> {
    data_manager(ctx).find_by_query_criteria(query, page)
}

pub fn count(ctx: &CommandContext, query: &JobQuery) -> Result<u64> {
    data_manager(ctx).count_by_query_criteria(query)
}

// ===== Locking =====

/// Release the expired lock of a job so another worker can pick it up
pub fn reset_expired(ctx: &mut CommandContext, job_id: &str) -> Result<()> {
    let job = ctx.require_mut::<Job>(job_id)?;
    job.lock_owner = None;
    job.lock_expiration_time = None;
    Ok(())
}

/// Lock up to `max_jobs` due jobs of `kind` for `lock_owner`
///
/// An exclusive job is skipped while another exclusive job of the same process
/// instance is locked, and at most one exclusive job per process instance is
/// taken in one batch. Two workers racing for the same job are separated by
/// the optimistic lock at commit.
pub fn acquire_jobs(
    ctx: &mut CommandContext,
    kind: JobKind,
    lock_owner: &str,
    lock_time_ms: u64,
    max_jobs: usize,
) -> Result<Vec<String>> {
    let now = ctx.now();
    let lock_until = i64::try_from(lock_time_ms)
        .ok()
        .and_then(Duration::try_milliseconds)
        .and_then(|lock_time| now.checked_add_signed(lock_time))
        .ok_or_else(|| ProcxError::InvalidConfig {
            message: format!("lock time of {} ms is out of range", lock_time_ms),
        })?;
    let candidates = find_due(ctx, kind, Page::first(max_jobs.saturating_mul(2).max(1)))?;

    let mut acquired = Vec::new();
    let mut exclusive_instances = HashSet::new();
    for candidate in candidates {
        if acquired.len() >= max_jobs {
            break;
        }
        if candidate.is_locked() {
            continue;
        }
        if candidate.exclusive {
            if let Some(pi) = &candidate.process_instance_id {
                if exclusive_instances.contains(pi) || data_manager(ctx).count_locked_exclusive(pi)? > 0 {
                    continue;
                }
                exclusive_instances.insert(pi.clone());
            }
        }
        let job = ctx.require_mut::<Job>(&candidate.id)?;
        job.lock_owner = Some(lock_owner.to_string());
        job.lock_expiration_time = Some(lock_until);
        acquired.push(candidate.id);
    }
    Ok(acquired)
}

/// Give back a job acquired but not executed
pub fn unacquire(ctx: &mut CommandContext, job_id: &str) -> Result<()> {
    reset_expired(ctx, job_id)
}

// ===== Async continuation =====

/// A job that resumes `execution` in a later unit of work; not yet inserted
pub fn create_async_job(ctx: &mut CommandContext, execution: &Execution, exclusive: bool) -> Result<Job> {
    let mut job = Job::new(ctx.new_id(), JobKind::Async, ASYNC_CONTINUATION)
        .with_execution_id(&execution.id)
        .with_process_instance_id(&execution.process_instance_id)
        .with_exclusive(exclusive)
        .with_retries(ctx.config().default_job_retries);
    job.process_definition_id = Some(execution.process_definition_id.clone());
    job.element_id = execution.activity_id.clone();
    job.deployment_id = execution.deployment_id.clone();
    job.create_time = Some(ctx.now());
    Ok(job)
}

pub fn schedule_async_job(ctx: &mut CommandContext, job: Job) -> Result<bool> {
    insert(ctx, job, true)
}

// ===== Timers =====

/// A timer job firing at `due_date` on `element_id`; not yet inserted
pub fn create_timer_job(
    ctx: &mut CommandContext,
    execution: &Execution,
    element_id: &str,
    due_date: DateTime<Utc>,
    repeat: Option<&str>,
    end_date: Option<DateTime<Utc>>,
) -> Result<Job> {
    if let Some(expression) = repeat {
        expression.parse::<RepeatExpression>()?;
    }
    let configuration = TimerJobConfiguration {
        activity_id: Some(element_id.to_string()),
        timer_end_date: end_date.map(|d| d.to_rfc3339()),
        calendar_name: None,
    };
    let mut job = Job::new(ctx.new_id(), JobKind::Timer, TRIGGER_TIMER)
        .with_execution_id(&execution.id)
        .with_process_instance_id(&execution.process_instance_id)
        .with_configuration(configuration.to_json()?)
        .with_due_date(due_date)
        .with_retries(ctx.config().default_job_retries);
    job.process_definition_id = Some(execution.process_definition_id.clone());
    job.element_id = Some(element_id.to_string());
    job.deployment_id = execution.deployment_id.clone();
    job.repeat = repeat.map(str::to_string);
    job.end_date = end_date;
    Ok(job)
}

/// Turn a due timer into an executable job
///
/// A repeating timer schedules its next occurrence first, unless its
/// repetitions are used up or the next due date lies after its end date.
/// Returns the executable job id, or `None` if the owning execution is gone.
pub fn move_timer_to_executable(ctx: &mut CommandContext, timer_job_id: &str) -> Result<Option<String>> {
    let timer = ctx.require::<Job>(timer_job_id)?.clone();
    if timer.kind != JobKind::Timer {
        return Err(ProcxError::programmatic(format!(
            "job {} is a {} job, not a timer",
            timer.id, timer.kind
        )));
    }

    if let (Some(expression), Some(due)) = (&timer.repeat, timer.due_date) {
        let configuration = TimerJobConfiguration::parse(timer.handler_configuration.as_deref().unwrap_or(""));
        let end_date = match timer.end_date {
            Some(end) => Some(end),
            None => configuration.end_date()?,
        };
        let repeat: RepeatExpression = expression.parse()?;
        if let Some((next_due, next_repeat)) = repeat.next(due, end_date) {
            let mut next = timer.copy_as(ctx.new_id(), JobKind::Timer);
            next.due_date = Some(next_due);
            next.repeat = Some(next_repeat.to_string());
            next.create_time = Some(ctx.now());
            next.custom_values = copy_ref(ctx, &timer.custom_values)?;
            insert(ctx, next, true)?;
        }
    }

    move_job(ctx, &timer, JobKind::Async, |_| {})
}

// ===== Kind transitions =====

/// Copy `job` under a new id and kind, then delete the original
///
/// Blobs are copied so the original's cascade can delete its own.
fn move_job(
    ctx: &mut CommandContext,
    job: &Job,
    kind: JobKind,
    adjust: impl FnOnce(&mut Job),
) -> Result<Option<String>> {
    let mut moved = job.copy_as(ctx.new_id(), kind);
    moved.exception_message = job.exception_message.clone();
    moved.exception = copy_ref(ctx, &job.exception)?;
    moved.custom_values = copy_ref(ctx, &job.custom_values)?;
    moved.create_time = Some(ctx.now());
    adjust(&mut moved);
    let moved_id = moved.id.clone();
    let copied_blobs: Vec<ByteArrayRef> = moved
        .exception
        .iter()
        .chain(moved.custom_values.iter())
        .cloned()
        .collect();

    let inserted = insert(ctx, moved, true)?;
    if !inserted {
        for blob in &copied_blobs {
            blob.delete(ctx)?;
        }
        tracing::warn!(job_id = %job.id, target_kind = kind.as_str(), "job not moved; execution gone");
    }
    delete(ctx, &job.id, true)?;
    Ok(inserted.then_some(moved_id))
}

fn copy_ref(ctx: &mut CommandContext, reference: &Option<ByteArrayRef>) -> Result<Option<ByteArrayRef>> {
    match reference {
        Some(r) => r.copy(ctx),
        None => Ok(None),
    }
}

pub fn move_to_dead_letter(ctx: &mut CommandContext, job_id: &str) -> Result<Option<String>> {
    let job = ctx.require::<Job>(job_id)?.clone();
    move_job(ctx, &job, JobKind::DeadLetter, |j| {
        j.retries = 0;
        j.due_date = None;
    })
}

/// Make a dead-letter job executable again with `retries` attempts
pub fn move_dead_letter_to_executable(ctx: &mut CommandContext, job_id: &str, retries: i32) -> Result<Option<String>> {
    let job = ctx.require::<Job>(job_id)?.clone();
    if job.kind != JobKind::DeadLetter {
        return Err(ProcxError::programmatic(format!(
            "job {} is a {} job, not a dead letter job",
            job.id, job.kind
        )));
    }
    move_job(ctx, &job, JobKind::Async, |j| {
        j.retries = retries;
        j.exception = None;
        j.exception_message = None;
    })
}

pub fn move_to_suspended(ctx: &mut CommandContext, job_id: &str) -> Result<Option<String>> {
    let job = ctx.require::<Job>(job_id)?.clone();
    move_job(ctx, &job, JobKind::Suspended, |_| {})
}

/// Reactivate a suspended job as a timer or executable job
pub fn activate(ctx: &mut CommandContext, job_id: &str) -> Result<Option<String>> {
    let job = ctx.require::<Job>(job_id)?.clone();
    let kind = if job.handler_type == TRIGGER_TIMER {
        JobKind::Timer
    } else {
        JobKind::Async
    };
    move_job(ctx, &job, kind, |_| {})
}

// ===== Failure =====

/// Record a failed execution attempt
///
/// Decrements the retries, replaces the stored failure detail and releases
/// the lock. A job without retries left moves to the dead-letter kind.
pub fn handle_failed_job(
    ctx: &mut CommandContext,
    job_id: &str,
    message: &str,
    detail: Option<String>,
) -> Result<()> {
    let job = ctx.require::<Job>(job_id)?.clone();
    let retries = (job.retries - 1).max(0);

    if let Some(previous) = &job.exception {
        previous.delete(ctx)?;
    }
    let exception = detail
        .map(|d| ByteArrayRef::create(ctx, EXCEPTION_NAME, d.into_bytes()))
        .transpose()?;

    let stored = ctx.require_mut::<Job>(job_id)?;
    stored.retries = retries;
    stored.exception = exception;
    stored.exception_message = Some(truncate(message, MAX_EXCEPTION_MESSAGE_LENGTH));
    stored.lock_owner = None;
    stored.lock_expiration_time = None;

    ctx.fire(EngineEvent::JobRetriesDecremented {
        job_id: job_id.to_string(),
        retries,
    });
    ctx.fire(EngineEvent::JobExecutionFailure {
        job_id: job_id.to_string(),
        message: message.to_string(),
    });
    tracing::warn!(job_id, retries, error_message = message, "job execution failed");

    if retries == 0 {
        move_to_dead_letter(ctx, job_id)?;
    }
    Ok(())
}

fn truncate(message: &str, max: usize) -> String {
    match message.char_indices().nth(max) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

// ===== Execution =====

/// Run the handler of an executable job, then delete the job
pub fn execute_job(ctx: &mut CommandContext, job_id: &str) -> Result<()> {
    let job = ctx.require::<Job>(job_id)?.clone();
    ctx.diagnostics_mut().tag_job(&job.id);
    if !matches!(job.kind, JobKind::Async | JobKind::History) {
        return Err(ProcxError::programmatic(format!(
            "job {} of kind {} cannot be executed",
            job.id, job.kind
        )));
    }

    let handler = ctx
        .services()
        .job_handlers
        .get(&job.handler_type)
        .ok_or_else(|| ProcxError::JobHandlerNotFound {
            handler_type: job.handler_type.clone(),
        })?;
    handler.execute(&job, job.handler_configuration.as_deref(), ctx)?;

    delete(ctx, &job.id, true)?;
    ctx.fire(EngineEvent::JobExecutionSuccess { job_id: job.id });
    Ok(())
}

// ===== Deployment =====

/// Move every job of a deployment to `new_tenant_id`
pub fn update_tenant_id_for_deployment(
    ctx: &mut CommandContext,
    deployment_id: &str,
    new_tenant_id: Option<&str>,
) -> Result<usize> {
    let rows = data_manager(ctx).find_by_deployment_id(deployment_id)?;
    let by_deployment = MatchFn(|j: &Job, d: &str| j.deployment_id.as_deref() == Some(d));
    let jobs = ctx.reconcile_rows(Some(rows), &by_deployment, deployment_id);
    for job in &jobs {
        if let Some(stored) = ctx.find_by_id_mut::<Job>(&job.id)? {
            stored.tenant_id = new_tenant_id.map(str::to_string);
        }
    }
    Ok(jobs.len())
}
