//! Job manager tests
//!
//! ## Scenarios Covered
//!
//! 1. Insert links the job to its execution, inherits the tenant, counts it
//! 2. Insert against a missing execution soft-fails and stores nothing
//! 3. A rejected duplicate insert leaves the execution untouched
//! 4. Delete cascades to both byte arrays, even when the execution is gone
//! 5. Failed attempts decrement retries and end in the dead-letter kind
//! 6. Exclusive acquisition serializes jobs of one process instance
//! 7. Timers move to executable and schedule their next repetition
//! 8. Suspension, activation and dead-letter recovery keep counters paired

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use chrono::Duration;
use common::{harness, harness_with, t0};
use procx_core::events::EngineEvent;
use procx_core::job::{self, EXCEPTION_NAME};
use procx_core::persistence::JobQuery;
use procx_core::{ByteArray, ByteArrayRef, EngineConfig, Execution, Job, JobKind, ProcxError};

fn async_job(ctx: &mut procx_core::CommandContext, execution_id: &str) -> Job {
    Job::new(ctx.new_id(), JobKind::Async, job::ASYNC_CONTINUATION).with_execution_id(execution_id)
}

#[test]
fn test_insert_links_job_and_increments_counter() {
    // GIVEN a process instance of tenant "acme"
    let h = harness();
    let pi = h.run(|ctx| {
        let e = Execution::new_process_instance("pi-1", "def:1").with_tenant("acme");
        ctx.insert(e)?;
        Ok("pi-1".to_string())
    })
    .unwrap();

    // WHEN a job is inserted for it
    let job_id = h
        .run(|ctx| {
            let job = async_job(ctx, &pi);
            let id = job.id.clone();
            assert!(job::insert(ctx, job, true)?);
            let execution = ctx.require::<Execution>(&pi)?;
            assert_eq!(execution.jobs().unwrap(), &[id.clone()]);
            Ok(id)
        })
        .unwrap();

    // THEN the job carries the tenant and the instance, and the counter moved
    let job = h.run(|ctx| Ok(ctx.require::<Job>(&job_id)?.clone())).unwrap();
    assert_eq!(job.tenant_id.as_deref(), Some("acme"));
    assert_eq!(job.process_instance_id.as_deref(), Some("pi-1"));
    assert_eq!(job.create_time, Some(t0()));
    assert_eq!(h.execution(&pi).unwrap().job_count, 1);
    assert!(h
        .events
        .events()
        .contains(&EngineEvent::EntityCreated {
            kind: procx_core::cache::EntityKind::Job,
            id: job_id
        }));
}

#[test]
fn test_insert_with_missing_execution_soft_fails() {
    // GIVEN no execution "ghost"
    let h = harness();

    // WHEN a job referencing it is inserted
    let inserted = h
        .run(|ctx| {
            let job = async_job(ctx, "ghost");
            job::insert(ctx, job, true)
        })
        .unwrap();

    // THEN insert reports false and nothing is stored
    assert!(!inserted);
    let count = h
        .run(|ctx| job::count(ctx, &JobQuery::new()))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn test_duplicate_insert_leaves_execution_untouched() {
    let h = harness();
    let pi = h.seed_instance("def:1", "a");

    // GIVEN a job "j1" already inserted in this unit of work
    let (second, linked, counted) = h
        .run(|ctx| {
            let first = Job::new("j1", JobKind::Async, job::ASYNC_CONTINUATION).with_execution_id(&pi);
            assert!(job::insert(ctx, first, true)?);

            // WHEN a second job with the same id is inserted
            let again = Job::new("j1", JobKind::Async, job::ASYNC_CONTINUATION).with_execution_id(&pi);
            let second = job::insert(ctx, again, true);

            let execution = ctx.require::<Execution>(&pi)?;
            Ok((second, execution.jobs().map(<[String]>::to_vec), execution.job_count))
        })
        .unwrap();

    // THEN it fails and neither the link nor the counter changed
    assert!(matches!(second, Err(ProcxError::AlreadyExists { .. })));
    assert_eq!(linked, Some(vec!["j1".to_string()]));
    assert_eq!(counted, 1);
    assert_eq!(h.execution(&pi).unwrap().job_count, 1);
}

#[test]
fn test_counting_disabled_leaves_counter_untouched() {
    let mut config = EngineConfig::default();
    config.counting_enabled = false;
    let h = harness_with(config);
    let pi = h.seed_instance("def:1", "a");

    h.run(|ctx| {
        let job = async_job(ctx, &pi);
        job::insert(ctx, job, false)
    })
    .unwrap();

    assert_eq!(h.execution(&pi).unwrap().job_count, 0);
}

#[test]
fn test_delete_cascades_byte_arrays_when_execution_gone() {
    // GIVEN a job with both byte arrays whose execution was deleted
    let h = harness();
    let pi = h.seed_instance("def:1", "a");
    let (job_id, exception_id, custom_id) = h
        .run(|ctx| {
            let mut job = async_job(ctx, &pi);
            let exception = ByteArrayRef::create(ctx, EXCEPTION_NAME, b"trace".to_vec())?;
            let custom = ByteArrayRef::create(ctx, "job.customValues", b"{}".to_vec())?;
            let ids = (job.id.clone(), exception.id().to_string(), custom.id().to_string());
            job.exception = Some(exception);
            job.custom_values = Some(custom);
            job::insert(ctx, job, true)?;
            Ok(ids)
        })
        .unwrap();
    h.run(|ctx| ctx.delete::<Execution>(&pi)).unwrap();

    // WHEN the job is deleted
    h.run(|ctx| job::delete(ctx, &job_id, true)).unwrap();

    // THEN the job and both byte arrays are gone
    h.run(|ctx| {
        assert!(ctx.find_by_id::<Job>(&job_id)?.is_none());
        assert!(ctx.find_by_id::<ByteArray>(&exception_id)?.is_none());
        assert!(ctx.find_by_id::<ByteArray>(&custom_id)?.is_none());
        Ok(())
    })
    .unwrap();
    assert!(matches!(
        h.events.events().last(),
        Some(EngineEvent::EntityDeleted { id, .. }) if *id == job_id
    ));
}

#[test]
fn test_delete_unknown_job_is_not_found() {
    let h = harness();
    let err = h.run(|ctx| job::delete(ctx, "nope", true)).unwrap_err();
    assert!(matches!(err, procx_core::ProcxError::NotFound { .. }));
}

#[test]
fn test_failed_job_moves_to_dead_letter_after_last_retry() {
    // GIVEN an executable job with two retries
    let h = harness();
    let pi = h.seed_instance("def:1", "a");
    let job_id = h
        .run(|ctx| {
            let job = async_job(ctx, &pi).with_retries(2);
            let id = job.id.clone();
            job::insert(ctx, job, true)?;
            Ok(id)
        })
        .unwrap();

    // WHEN the first attempt fails
    h.run(|ctx| job::handle_failed_job(ctx, &job_id, "boom", Some("trace 1".to_string())))
        .unwrap();

    // THEN one retry remains and the failure is recorded
    let job = h.run(|ctx| Ok(ctx.require::<Job>(&job_id)?.clone())).unwrap();
    assert_eq!(job.retries, 1);
    assert_eq!(job.exception_message.as_deref(), Some("boom"));
    assert!(!job.is_locked());

    // WHEN the second attempt fails
    h.run(|ctx| job::handle_failed_job(ctx, &job_id, "boom again", Some("trace 2".to_string())))
        .unwrap();

    // THEN the job is a dead letter carrying the last failure detail
    let dead = h
        .run(|ctx| job::query(ctx, &JobQuery::new().kind(JobKind::DeadLetter), None))
        .unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].retries, 0);
    assert_eq!(dead[0].exception_message.as_deref(), Some("boom again"));
    let detail = h
        .run(|ctx| dead[0].exception.as_ref().unwrap().as_string(ctx))
        .unwrap();
    assert_eq!(detail.as_deref(), Some("trace 2"));

    let execution = h.execution(&pi).unwrap();
    assert_eq!(execution.job_count, 0);
    assert_eq!(execution.dead_letter_job_count, 1);
    assert_eq!(h.db.len(procx_core::cache::EntityKind::ByteArray), 1);

    let events = h.events.events();
    assert!(events.contains(&EngineEvent::JobRetriesDecremented {
        job_id: job_id.clone(),
        retries: 0
    }));
}

#[test]
fn test_dead_letter_back_to_executable() {
    let h = harness();
    let pi = h.seed_instance("def:1", "a");
    let job_id = h
        .run(|ctx| {
            let job = async_job(ctx, &pi);
            let id = job.id.clone();
            job::insert(ctx, job, true)?;
            Ok(id)
        })
        .unwrap();
    let dead_id = h
        .run(|ctx| job::move_to_dead_letter(ctx, &job_id))
        .unwrap()
        .unwrap();

    let revived = h
        .run(|ctx| job::move_dead_letter_to_executable(ctx, &dead_id, 5))
        .unwrap()
        .unwrap();

    let job = h.run(|ctx| Ok(ctx.require::<Job>(&revived)?.clone())).unwrap();
    assert_eq!(job.kind, JobKind::Async);
    assert_eq!(job.retries, 5);
    let execution = h.execution(&pi).unwrap();
    assert_eq!((execution.job_count, execution.dead_letter_job_count), (1, 0));
}

#[test]
fn test_suspend_and_activate_restore_kind() {
    let h = harness();
    let pi = h.seed_instance("def:1", "a");
    let timer_id = h
        .run(|ctx| {
            let execution = ctx.require::<Execution>(&pi)?.clone();
            let timer = job::create_timer_job(ctx, &execution, "a", t0() + Duration::hours(1), None, None)?;
            let id = timer.id.clone();
            job::insert(ctx, timer, true)?;
            Ok(id)
        })
        .unwrap();

    let suspended = h.run(|ctx| job::move_to_suspended(ctx, &timer_id)).unwrap().unwrap();
    assert_eq!(h.execution(&pi).unwrap().suspended_job_count, 1);

    let active = h.run(|ctx| job::activate(ctx, &suspended)).unwrap().unwrap();
    let job = h.run(|ctx| Ok(ctx.require::<Job>(&active)?.clone())).unwrap();
    assert_eq!(job.kind, JobKind::Timer);
    let execution = h.execution(&pi).unwrap();
    assert_eq!((execution.timer_job_count, execution.suspended_job_count), (1, 0));
}

#[test]
fn test_exclusive_jobs_of_one_instance_are_acquired_one_at_a_time() {
    // GIVEN two exclusive jobs of the same instance and one of another
    let h = harness();
    let pi1 = h.seed_instance("def:1", "a");
    let pi2 = h.seed_instance("def:1", "a");
    h.run(|ctx| {
        for pi in [&pi1, &pi1, &pi2] {
            let job = async_job(ctx, pi);
            job::insert(ctx, job, false)?;
        }
        Ok(())
    })
    .unwrap();

    // WHEN a worker acquires
    let first = h
        .run(|ctx| job::acquire_jobs(ctx, JobKind::Async, "node-a", 60_000, 10))
        .unwrap();

    // THEN one job per instance is locked
    assert_eq!(first.len(), 2);

    // AND a second worker gets nothing while the instance lock is held
    let second = h
        .run(|ctx| job::acquire_jobs(ctx, JobKind::Async, "node-b", 60_000, 10))
        .unwrap();
    assert!(second.is_empty());
}

#[test]
fn test_out_of_range_lock_time_is_rejected() {
    let h = harness();
    let pi = h.seed_instance("def:1", "a");
    h.run(|ctx| {
        let job = async_job(ctx, &pi);
        job::insert(ctx, job, false)
    })
    .unwrap();

    let err = h
        .run(|ctx| job::acquire_jobs(ctx, JobKind::Async, "node-a", u64::MAX, 10))
        .unwrap_err();

    assert!(matches!(err, ProcxError::InvalidConfig { .. }));
    let locked = h
        .run(|ctx| job::count(ctx, &JobQuery::new().kind(JobKind::Async)))
        .unwrap();
    assert_eq!(locked, 1);
}

#[test]
fn test_expired_lock_is_reset() {
    let h = harness();
    let pi = h.seed_instance("def:1", "a");
    h.run(|ctx| {
        let job = async_job(ctx, &pi);
        job::insert(ctx, job, false)
    })
    .unwrap();
    let acquired = h
        .run(|ctx| job::acquire_jobs(ctx, JobKind::Async, "node-a", 1_000, 1))
        .unwrap();
    assert_eq!(acquired.len(), 1);

    h.clock.advance(Duration::seconds(5));
    let reset = h
        .executor
        .apply(procx_core::Command::ResetExpiredJobs { batch_size: 10 })
        .unwrap();

    assert_eq!(reset.job_ids(), acquired);
    let job = h.run(|ctx| Ok(ctx.require::<Job>(&acquired[0])?.clone())).unwrap();
    assert!(job.lock_owner.is_none());
}

#[test]
fn test_repeating_timer_schedules_next_occurrence() {
    // GIVEN a timer repeating twice, due now
    let h = harness();
    let pi = h.seed_instance("def:1", "a");
    h.run(|ctx| {
        let execution = ctx.require::<Execution>(&pi)?.clone();
        let timer = job::create_timer_job(ctx, &execution, "a", t0(), Some("R2/PT10M"), None)?;
        job::insert(ctx, timer, true)
    })
    .unwrap();

    // WHEN due timers are moved
    let moved = h
        .executor
        .apply(procx_core::Command::MoveDueTimers { batch_size: 10 })
        .unwrap()
        .job_ids();

    // THEN one executable job exists and the next timer is due ten minutes later
    assert_eq!(moved.len(), 1);
    let timers = h
        .run(|ctx| job::query(ctx, &JobQuery::new().kind(JobKind::Timer), None))
        .unwrap();
    assert_eq!(timers.len(), 1);
    assert_eq!(timers[0].due_date, Some(t0() + Duration::minutes(10)));
    assert_eq!(timers[0].repeat.as_deref(), Some("R1/PT10M"));

    let execution = h.execution(&pi).unwrap();
    assert_eq!((execution.job_count, execution.timer_job_count), (1, 1));
}

#[test]
fn test_update_tenant_for_deployment() {
    let h = harness();
    let pi = h.seed_instance("def:1", "a");
    h.run(|ctx| {
        for _ in 0..2 {
            let mut job = async_job(ctx, &pi);
            job.deployment_id = Some("dep-1".to_string());
            job::insert(ctx, job, false)?;
        }
        Ok(())
    })
    .unwrap();

    let updated = h
        .run(|ctx| job::update_tenant_id_for_deployment(ctx, "dep-1", Some("globex")))
        .unwrap();

    assert_eq!(updated, 2);
    let jobs = h
        .run(|ctx| job::query(ctx, &JobQuery::new().tenant_id("globex"), None))
        .unwrap();
    assert_eq!(jobs.len(), 2);
}
