//! Fault routing tests
//!
//! ## Scenarios Covered
//!
//! 1. Business fault caught by a boundary handler continues at its target
//! 2. Business fault from a child caught by a process-level handler
//! 3. Business fault with no handler fails with UnhandledBusinessFault
//! 4. Runtime fault propagates unchanged and rolls the unit of work back

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{harness, FailingBehavior, RecordingBehavior};
use procx_core::process::{ErrorEventHandler, FlowNode, ProcessDefinition};
use procx_core::{Command, CommandOutcome, Execution, ProcxError};
use std::sync::Arc;

fn handler(id: &str, code: Option<&str>, attached: Option<&str>, target: &str) -> ErrorEventHandler {
    ErrorEventHandler {
        id: id.to_string(),
        error_code: code.map(str::to_string),
        attached_to_activity: attached.map(str::to_string),
        target_activity_id: target.to_string(),
    }
}

fn start(h: &common::Harness, definition: &str, activity: &str) -> procx_core::Result<String> {
    match h.executor.apply(Command::StartProcessInstance {
        process_definition_id: definition.to_string(),
        start_activity_id: activity.to_string(),
        tenant_id: None,
        variables: Default::default(),
    })? {
        CommandOutcome::ProcessInstance { id } => Ok(id),
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn test_boundary_handler_catches_business_fault() {
    // GIVEN a task throwing E1 with a boundary handler for E1
    let h = harness();
    let recovered = RecordingBehavior::new();
    h.registry.deploy(
        ProcessDefinition::new("def:b", "b")
            .with_node(FlowNode::new(
                "task",
                Arc::new(FailingBehavior(ProcxError::business_fault("E1", "rejected"))),
            ))
            .with_node(FlowNode::new("recover", recovered.clone()))
            .with_error_handler(handler("boundary", Some("E1"), Some("task"), "recover")),
    );

    // WHEN the process starts at the task
    let pi = start(&h, "def:b", "task").unwrap();

    // THEN execution continued at the handler's target
    assert_eq!(recovered.calls().len(), 1);
    assert_eq!(recovered.calls()[0].0, pi);
    let instance = h.execution(&pi).unwrap();
    assert_eq!(instance.activity_id.as_deref(), Some("recover"));
    assert!(instance.is_active);
}

#[test]
fn test_process_handler_catches_fault_from_child() {
    // GIVEN a process-level handler and a child execution on a throwing task
    let h = harness();
    let recovered = RecordingBehavior::new();
    h.registry.deploy(
        ProcessDefinition::new("def:p", "p")
            .with_node(FlowNode::new(
                "task",
                Arc::new(FailingBehavior(ProcxError::business_fault("E2", "rejected"))),
            ))
            .with_node(FlowNode::new("recover", recovered.clone()))
            .with_error_handler(handler("catch-all", None, None, "recover")),
    );
    let pi = h.seed_instance("def:p", "sub");
    let child = h.seed_child(&pi, "task");

    // WHEN the child's task runs
    h.run(|ctx| {
        ctx.plan(procx_core::agenda::Operation::ContinueProcess {
            execution_id: child.clone(),
        });
        Ok(())
    })
    .unwrap();

    // THEN the child is deactivated and the instance continues at the target
    assert!(!h.execution(&child).unwrap().is_active);
    let instance = h.execution(&pi).unwrap();
    assert_eq!(instance.activity_id.as_deref(), Some("recover"));
    assert_eq!(recovered.calls(), vec![(pi, None)]);
}

#[test]
fn test_unhandled_business_fault() {
    let h = harness();
    h.registry.deploy(
        ProcessDefinition::new("def:u", "u")
            .with_node(FlowNode::new(
                "task",
                Arc::new(FailingBehavior(ProcxError::business_fault("E3", "rejected"))),
            ))
            .with_error_handler(handler("other", Some("E1"), Some("task"), "task")),
    );

    let err = start(&h, "def:u", "task").unwrap_err();

    assert!(matches!(
        err,
        ProcxError::UnhandledBusinessFault { ref error_code, .. } if error_code == "E3"
    ));
    assert_eq!(h.db.len(procx_core::cache::EntityKind::Execution), 0);
}

#[test]
fn test_runtime_fault_propagates_unchanged() {
    // GIVEN a task failing with a runtime error and a catch-all handler
    let h = harness();
    h.registry.deploy(
        ProcessDefinition::new("def:r", "r")
            .with_node(FlowNode::new(
                "task",
                Arc::new(FailingBehavior(ProcxError::runtime("database unavailable"))),
            ))
            .with_error_handler(handler("catch-all", None, None, "task")),
    );
    let pi = h.seed_instance("def:r", "task");

    // WHEN the task runs inside a unit of work that also changed the instance
    let err = h
        .run(|ctx| {
            ctx.require_mut::<Execution>(&pi)?.tenant_id = Some("changed".to_string());
            ctx.plan(procx_core::agenda::Operation::ContinueProcess {
                execution_id: pi.clone(),
            });
            Ok(())
        })
        .unwrap_err();

    // THEN the error is the original one and the change was rolled back
    assert_eq!(err, ProcxError::runtime("database unavailable"));
    assert_eq!(h.execution(&pi).unwrap().tenant_id, None);
}
