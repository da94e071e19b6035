use super::Operation;
use crate::context::CommandContext;
use crate::errors::{ProcxError, Result};
use crate::model::Execution;
use crate::process::ErrorEventHandler;

/// Route a business fault to the nearest matching error handler
///
/// Walks from `execution_id` up the execution tree. At each level a boundary
/// handler attached to the execution's current activity is tried; at the
/// process instance, process-level handlers are tried as well. The catching
/// execution moves to the handler's target activity and continues there;
/// executions between the thrower and the catcher are deactivated.
///
/// Fails with `UnhandledBusinessFault` when nothing catches `error_code`.
pub fn propagate_error(
    ctx: &mut CommandContext,
    error_code: &str,
    message: &str,
    execution_id: &str,
) -> Result<()> {
    let mut passed = Vec::new();
    let mut current = Some(execution_id.to_string());

    while let Some(id) = current {
        let execution = ctx.require::<Execution>(&id)?.clone();
        let definition = ctx.process_definition(&execution.process_definition_id)?;

        let boundary = execution
            .activity_id
            .as_deref()
            .and_then(|activity_id| definition.boundary_handlers(activity_id, error_code).next());
        let handler = match boundary {
            Some(h) => Some(h),
            None if execution.is_process_instance() => definition.process_handlers(error_code).next(),
            None => None,
        };

        if let Some(handler) = handler {
            tracing::debug!(
                error_code,
                error_message = message,
                handler_id = %handler.id,
                execution_id = %execution.id,
                "business fault caught"
            );
            return continue_at_handler(ctx, &execution.id, handler, &passed);
        }

        passed.push(execution.id.clone());
        current = execution.parent_id.clone();
    }

    Err(ProcxError::UnhandledBusinessFault {
        error_code: error_code.to_string(),
        execution_id: execution_id.to_string(),
    })
}

fn continue_at_handler(
    ctx: &mut CommandContext,
    catching_id: &str,
    handler: &ErrorEventHandler,
    passed: &[String],
) -> Result<()> {
    for id in passed {
        ctx.require_mut::<Execution>(id)?.is_active = false;
    }
    let catching = ctx.require_mut::<Execution>(catching_id)?;
    catching.activity_id = Some(handler.target_activity_id.clone());
    catching.is_active = true;
    ctx.plan(Operation::ContinueProcess {
        execution_id: catching_id.to_string(),
    });
    Ok(())
}
