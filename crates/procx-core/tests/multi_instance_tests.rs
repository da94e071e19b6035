//! Continue-multi-instance tests
//!
//! ## Scenarios Covered
//!
//! 1. Synchronous node: each instance sees its own loop counter, siblings untouched
//! 2. Asynchronous node: exactly one job bound to the execution, behavior deferred
//! 3. Executing the deferred job runs the behavior with the stored loop counter
//! 4. Non-flow-node element and non-multi-instance node fail with programmatic errors
//! 5. A failure rolls the whole unit of work back

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{deploy_multi_instance, harness, FailingBehavior, RecordingBehavior};
use procx_core::job;
use procx_core::persistence::JobQuery;
use procx_core::process::{FlowNode, MultiInstanceCharacteristics, ProcessDefinition, SequenceFlow};
use procx_core::{Command, CommandOutcome, JobKind, ProcxError};
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_synchronous_instances_get_their_own_loop_counter() {
    // GIVEN a multi-instance node and a root execution sitting on it
    let h = harness();
    let behavior = RecordingBehavior::new();
    deploy_multi_instance(&h, behavior.clone(), false);
    let root = h.seed_instance("def:mi", "mi");

    // WHEN the root fans out into three instances
    let outcome = h
        .executor
        .apply(Command::StartMultiInstance {
            execution_id: root.clone(),
            instances: 3,
        })
        .unwrap();
    let CommandOutcome::Executions(children) = outcome else {
        panic!("unexpected outcome {:?}", outcome);
    };

    // THEN the behavior ran once per child, in index order
    assert_eq!(
        behavior.calls(),
        vec![
            (children[0].clone(), Some(json!(0))),
            (children[1].clone(), Some(json!(1))),
            (children[2].clone(), Some(json!(2))),
        ]
    );

    // AND each child keeps its own counter; the root carries none
    for (index, child) in children.iter().enumerate() {
        let execution = h.execution(child).unwrap();
        assert_eq!(execution.get_variable_local("loopCounter"), Some(&json!(index)));
        assert_eq!(execution.parent_id.as_deref(), Some(root.as_str()));
    }
    let root = h.execution(&root).unwrap();
    assert!(root.is_multi_instance_root);
    assert!(!root.has_variable_local("loopCounter"));
    assert_eq!(root.get_variable_local("nrOfInstances"), Some(&json!(3)));
}

#[test]
fn test_asynchronous_instance_defers_to_one_job() {
    // GIVEN an asynchronous multi-instance node
    let h = harness();
    let behavior = RecordingBehavior::new();
    deploy_multi_instance(&h, behavior.clone(), true);
    let root = h.seed_instance("def:mi", "mi");
    let child = h.seed_child(&root, "mi");

    // WHEN one instance is continued with index 4
    h.executor
        .apply(Command::ContinueMultiInstance {
            execution_id: child.clone(),
            loop_counter: 4,
        })
        .unwrap();

    // THEN the behavior has not run and exactly one async job references the child
    assert!(behavior.calls().is_empty());
    let jobs = h
        .run(|ctx| job::query(ctx, &JobQuery::new().kind(JobKind::Async), None))
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].execution_id.as_deref(), Some(child.as_str()));
    assert_eq!(jobs[0].handler_type, job::ASYNC_CONTINUATION);

    let execution = h.execution(&child).unwrap();
    assert_eq!(execution.get_variable_local("loopCounter"), Some(&json!(4)));
    assert_eq!(execution.job_counter(JobKind::Async), 1);

    // WHEN the job runs
    h.executor
        .apply(Command::ExecuteJob {
            job_id: jobs[0].id.clone(),
        })
        .unwrap();

    // THEN the behavior sees the stored counter and the job is gone
    assert_eq!(behavior.calls(), vec![(child.clone(), Some(json!(4)))]);
    let remaining = h
        .run(|ctx| job::count(ctx, &JobQuery::new().kind(JobKind::Async)))
        .unwrap();
    assert_eq!(remaining, 0);
    assert_eq!(h.execution(&child).unwrap().job_counter(JobKind::Async), 0);
}

#[test]
fn test_sequence_flow_is_not_a_valid_multi_instance_node() {
    let h = harness();
    h.registry.deploy(ProcessDefinition::new("def:flow", "flow").with_sequence_flow(SequenceFlow {
        id: "f1".to_string(),
        source_ref: "a".to_string(),
        target_ref: "b".to_string(),
    }));
    let pi = h.seed_instance("def:flow", "f1");

    let err = h
        .executor
        .apply(Command::ContinueMultiInstance {
            execution_id: pi,
            loop_counter: 0,
        })
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Programmatic error: no valid multi instance flow node, type: sequence flow. Halting."
    );
}

#[test]
fn test_plain_node_is_not_multi_instance() {
    let h = harness();
    let behavior = RecordingBehavior::new();
    deploy_multi_instance(&h, behavior.clone(), false);
    let pi = h.seed_instance("def:mi", "plain");

    let err = h
        .executor
        .apply(Command::ContinueMultiInstance {
            execution_id: pi,
            loop_counter: 0,
        })
        .unwrap_err();

    assert!(matches!(err, ProcxError::Programmatic { .. }));
    assert_eq!(
        err.to_string(),
        "Programmatic error: expected multi instance activity behavior, but got recording"
    );
    assert!(behavior.calls().is_empty());
}

#[test]
fn test_failed_instance_rolls_back_counter_and_siblings() {
    // GIVEN a multi-instance node whose behavior always fails
    let h = harness();
    h.registry.deploy(
        ProcessDefinition::new("def:fail", "fail").with_node(
            FlowNode::new("mi", Arc::new(FailingBehavior(ProcxError::runtime("boom"))))
                .multi_instance(MultiInstanceCharacteristics::default()),
        ),
    );
    let root = h.seed_instance("def:fail", "mi");

    // WHEN the fan-out runs
    let err = h
        .executor
        .apply(Command::StartMultiInstance {
            execution_id: root.clone(),
            instances: 2,
        })
        .unwrap_err();

    // THEN the error surfaces unchanged and nothing was persisted
    assert_eq!(err, ProcxError::runtime("boom"));
    let root = h.execution(&root).unwrap();
    assert!(!root.is_multi_instance_root);
    assert_eq!(h.db.len(procx_core::cache::EntityKind::Execution), 1);
}
