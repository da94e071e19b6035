use super::{propagate_error, OperationOutcome};
use crate::context::CommandContext;
use crate::errors::{ProcxError, Result};
use crate::events::EngineEvent;
use crate::history;
use crate::model::Execution;
use crate::process::FlowNode;
use std::sync::Arc;

/// Execute the current node of `execution_id` inline
///
/// Planned by the async-continuation job handler when a deferred operation
/// resumes, and by error propagation once a handler catches a fault.
pub fn continue_process(ctx: &mut CommandContext, execution_id: &str) -> Result<OperationOutcome> {
    let execution = ctx.require::<Execution>(execution_id)?.clone();
    let definition = ctx.process_definition(&execution.process_definition_id)?;
    let activity_id = execution.activity_id.as_deref().ok_or_else(|| {
        ProcxError::programmatic(format!(
            "Programmatic error: execution {} has no current activity",
            execution.id
        ))
    })?;
    let node = definition.flow_node(activity_id).map(Arc::clone).ok_or_else(|| {
        ProcxError::programmatic(format!(
            "Programmatic error: no flow node '{}' in process definition {}",
            activity_id, definition.id
        ))
    })?;

    ctx.diagnostics_mut().tag_execution(
        &execution.id,
        Some(&execution.process_instance_id),
        Some(&execution.process_definition_id),
        Some(&node.id),
    );
    execute_synchronous(ctx, &node, &execution)?;
    Ok(OperationOutcome::Done)
}

/// Run `node` for `execution` in the current unit of work
///
/// Records the activity start, notifies start listeners, dispatches
/// `ActivityStarted` and runs the behavior. A business fault raised by the
/// behavior is routed to the process's error handlers; any other error is
/// logged with the execution identifiers and returned unchanged.
pub fn execute_synchronous(ctx: &mut CommandContext, node: &FlowNode, execution: &Execution) -> Result<()> {
    history::record_activity_start(ctx, execution, node)?;

    for listener in &node.start_listeners {
        listener.notify(ctx, &execution.id)?;
    }

    tracing::debug!(
        behavior = node.behavior.name(),
        activity_id = %node.id,
        execution_id = %execution.id,
        "executing activity behavior"
    );

    ctx.fire(EngineEvent::ActivityStarted {
        activity_id: node.id.clone(),
        activity_name: node.name.clone(),
        execution_id: execution.id.clone(),
        process_instance_id: execution.process_instance_id.clone(),
        process_definition_id: execution.process_definition_id.clone(),
    });

    match node.behavior.execute(ctx, &execution.id) {
        Ok(()) => Ok(()),
        Err(ProcxError::BusinessFault {
            error_code,
            message,
        }) => propagate_error(ctx, &error_code, &message, &execution.id),
        Err(err) => {
            ctx.diagnostics_mut().tag_execution(
                &execution.id,
                Some(&execution.process_instance_id),
                Some(&execution.process_definition_id),
                Some(&node.id),
            );
            tracing::error!(
                execution_id = %execution.id,
                process_instance_id = %execution.process_instance_id,
                activity_id = %node.id,
                error = %err,
                "activity behavior failed"
            );
            Err(err)
        }
    }
}
