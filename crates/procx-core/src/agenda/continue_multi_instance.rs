use super::{execute_synchronous, Operation, OperationOutcome};
use crate::context::CommandContext;
use crate::errors::{ProcxError, Result};
use crate::job;
use crate::model::Execution;
use crate::process::FlowElement;
use serde_json::Value;
use std::sync::Arc;

/// Continue one instance of a multi-instance node
///
/// The loop counter is stored as a local variable of `execution_id` before
/// anything else, so both branches observe the index of this instance. A
/// synchronous node then runs inline; an asynchronous node gets a job bound to
/// the execution and the operation ends as `Deferred`.
pub fn continue_multi_instance(
    ctx: &mut CommandContext,
    execution_id: &str,
    loop_counter: i64,
) -> Result<OperationOutcome> {
    let execution = ctx.require::<Execution>(execution_id)?.clone();
    let definition = ctx.process_definition(&execution.process_definition_id)?;

    let element = execution
        .activity_id
        .as_deref()
        .and_then(|id| definition.element(id));
    let node = match element {
        Some(FlowElement::FlowNode(node)) => Arc::clone(node),
        other => {
            return Err(ProcxError::programmatic(format!(
                "Programmatic error: no valid multi instance flow node, type: {}. Halting.",
                other.map_or("none", FlowElement::type_name)
            )))
        }
    };
    let characteristics = node.multi_instance.as_ref().ok_or_else(|| {
        ProcxError::programmatic(format!(
            "Programmatic error: expected multi instance activity behavior, but got {}",
            node.behavior.name()
        ))
    })?;

    ctx.set_variable_local(
        execution_id,
        &characteristics.element_index_variable,
        Value::from(loop_counter),
    )?;
    ctx.diagnostics_mut().tag_execution(
        &execution.id,
        Some(&execution.process_instance_id),
        Some(&execution.process_definition_id),
        Some(&node.id),
    );

    if node.asynchronous {
        let job = job::create_async_job(ctx, &execution, node.exclusive)?;
        let job_id = job.id.clone();
        if !job::schedule_async_job(ctx, job)? {
            return Err(ProcxError::not_found("execution", execution_id));
        }
        Ok(OperationOutcome::Deferred { job_id })
    } else {
        execute_synchronous(ctx, &node, &execution)?;
        Ok(OperationOutcome::Done)
    }
}

/// Number of instances, stored on the multi-instance root
pub const NUMBER_OF_INSTANCES: &str = "nrOfInstances";

/// Fan `execution_id` out into `instances` child executions at its current
/// node and plan one `ContinueMultiInstance` per child, indexed from zero
///
/// Returns the child execution ids in index order.
pub fn plan_multi_instance(ctx: &mut CommandContext, execution_id: &str, instances: u32) -> Result<Vec<String>> {
    let root = ctx.require_mut::<Execution>(execution_id)?;
    root.is_multi_instance_root = true;
    root.set_variable_local(NUMBER_OF_INSTANCES, Value::from(instances));
    let root = root.clone();

    let mut children = Vec::with_capacity(instances as usize);
    for index in 0..instances {
        let mut child = Execution::new_child(ctx.new_id(), &root);
        child.activity_id = root.activity_id.clone();
        child.start_time = Some(ctx.now());
        let child_id = child.id.clone();
        ctx.insert(child)?;
        ctx.plan(Operation::ContinueMultiInstance {
            execution_id: child_id.clone(),
            loop_counter: i64::from(index),
        });
        children.push(child_id);
    }
    Ok(children)
}
