use super::{CommandContext, EngineServices};
use crate::apply::apply;
use crate::commands::{Command, CommandOutcome};
use crate::errors::Result;
use crate::{log_op_end, log_op_error, log_op_start};
use procx_core_types::{RequestContext, TraceId};
use std::sync::Arc;
use std::time::Instant;

/// Runs commands, each in its own unit of work
///
/// A command body runs against a fresh `CommandContext`; the agenda is then
/// drained and the context committed. Any error rolls the unit of work back
/// and is returned unchanged.
#[derive(Clone)]
pub struct CommandExecutor {
    services: Arc<EngineServices>,
}

impl CommandExecutor {
    pub fn new(services: Arc<EngineServices>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Arc<EngineServices> {
        &self.services
    }

    pub fn execute<T, F>(&self, op: &str, body: F) -> Result<T>
    where
        F: FnOnce(&mut CommandContext) -> Result<T>,
    {
        self.execute_traced(op, None, body)
    }

    /// Like `execute`, tagging the unit of work with an executor trace id
    pub fn execute_traced<T, F>(&self, op: &str, trace_id: Option<TraceId>, body: F) -> Result<T>
    where
        F: FnOnce(&mut CommandContext) -> Result<T>,
    {
        let start = Instant::now();
        let mut request = RequestContext::new();
        request.trace_id = trace_id;
        log_op_start!(op, request_id = %request.request_id);

        let mut ctx = CommandContext::new(Arc::clone(&self.services), request);
        let result = body(&mut ctx).and_then(|value| {
            ctx.run_agenda()?;
            ctx.commit()?;
            Ok(value)
        });

        let duration_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(value) => {
                log_op_end!(op, duration_ms = duration_ms, request_id = %ctx.request().request_id);
                Ok(value)
            }
            Err(err) => {
                if !ctx.is_closed() {
                    ctx.rollback();
                }
                let diag = ctx.diagnostics();
                log_op_error!(
                    op,
                    &err,
                    duration_ms = duration_ms,
                    request_id = %ctx.request().request_id,
                    execution_id = diag.execution_id.as_deref(),
                    job_id = diag.job_id.as_deref()
                );
                Err(err)
            }
        }
    }

    pub fn apply(&self, command: Command) -> Result<CommandOutcome> {
        let op = command.op_name();
        self.execute(op, |ctx| apply(ctx, command))
    }
}
