//! Logging facility tests
//!
//! ## Scenarios Covered
//!
//! 1. Every unit of work logs one start and one end event
//! 2. A failed unit of work logs end_error with kind, code and execution id
//! 3. A failed job logs end_error tagged with the job id

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{harness, FailingBehavior};
use procx_core::agenda::Operation;
use procx_core::logging_facility::init_test_capture;
use procx_core::procx_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};
use procx_core::process::{FlowNode, ProcessDefinition};
use procx_core::{Job, JobKind, ProcxError};
use std::sync::Arc;

#[test]
fn test_unit_of_work_logs_start_and_end() {
    let capture = init_test_capture();
    let h = harness();
    let op = "logging_test_start_end_unique_1";

    h.executor.execute(op, |_ctx| Ok(())).unwrap();

    capture.assert_event_exists(op, EVENT_START);
    capture.assert_event_exists(op, EVENT_END);
    let end = capture
        .events_for_op(op)
        .into_iter()
        .find(|e| e.event.as_deref() == Some(EVENT_END))
        .unwrap();
    assert!(end.field("duration_ms").is_some());
    assert!(end.field("request_id").is_some());
}

#[test]
fn test_failed_unit_of_work_logs_execution_id() {
    // GIVEN an instance whose current node fails at runtime
    let capture = init_test_capture();
    let h = harness();
    h.registry.deploy(ProcessDefinition::new("def:log", "log").with_node(FlowNode::new(
        "task",
        Arc::new(FailingBehavior(ProcxError::runtime("boom"))),
    )));
    let pi = h.seed_instance("def:log", "task");
    let op = "logging_test_end_error_unique_2";

    // WHEN it continues
    let err = h
        .executor
        .execute(op, |ctx| {
            ctx.plan(Operation::ContinueProcess {
                execution_id: pi.clone(),
            });
            Ok(())
        })
        .unwrap_err();
    assert_eq!(err, ProcxError::runtime("boom"));

    // THEN one end_error event carries the error code and the execution id
    let errors: Vec<_> = capture
        .events_for_op(op)
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_END_ERROR))
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field("err_code"), Some("ERR_RUNTIME"));
    assert_eq!(errors[0].field("execution_id"), Some(pi.as_str()));
    assert!(capture
        .events_for_op(op)
        .iter()
        .all(|e| e.event.as_deref() != Some(EVENT_END)));
}

#[test]
fn test_failed_job_logs_job_id() {
    let capture = init_test_capture();
    let h = harness();
    let job_id = h
        .run(|ctx| {
            let job = Job::new(ctx.new_id(), JobKind::Async, "no-such-handler");
            let id = job.id.clone();
            ctx.insert(job)?;
            Ok(id)
        })
        .unwrap();

    let err = h
        .executor
        .apply(procx_core::Command::ExecuteJob { job_id: job_id.clone() })
        .unwrap_err();

    assert!(matches!(err, ProcxError::JobHandlerNotFound { .. }));
    let tagged = capture.count_events(|e| {
        e.op.as_deref() == Some("execute_job")
            && e.event.as_deref() == Some(EVENT_END_ERROR)
            && e.field("job_id") == Some(job_id.as_str())
    });
    assert_eq!(tagged, 1);
}
