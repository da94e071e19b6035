use super::manager::{ASYNC_CONTINUATION, TRIGGER_TIMER};
use super::timer::TimerJobConfiguration;
use crate::agenda::Operation;
use crate::context::CommandContext;
use crate::errors::{ProcxError, Result};
use crate::events::EngineEvent;
use crate::history::AsyncHistoryJobHandler;
use crate::model::{Execution, Job};
use std::collections::HashMap;
use std::sync::Arc;

/// Work performed when a job of a given handler type executes
pub trait JobHandler: Send + Sync {
    fn handler_type(&self) -> &str;

    fn execute(&self, job: &Job, configuration: Option<&str>, ctx: &mut CommandContext) -> Result<()>;
}

/// Job handlers keyed by handler type; fixed at startup
#[derive(Default)]
pub struct JobHandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the async-continuation, trigger-timer and async-history handlers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AsyncContinuationJobHandler));
        registry.register(Arc::new(TriggerTimerJobHandler));
        registry.register(Arc::new(AsyncHistoryJobHandler));
        registry
    }

    /// Register `handler`, replacing any handler of the same type
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        self.handlers
            .insert(handler.handler_type().to_string(), handler);
    }

    pub fn get(&self, handler_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(handler_type).cloned()
    }

    pub fn handler_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

fn owning_execution(job: &Job) -> Result<&str> {
    job.execution_id.as_deref().ok_or_else(|| {
        ProcxError::programmatic(format!("job {} has no owning execution", job.id))
    })
}

/// Resumes a deferred operation by executing the current node inline
#[derive(Debug, Default, Clone, Copy)]
pub struct AsyncContinuationJobHandler;

impl JobHandler for AsyncContinuationJobHandler {
    fn handler_type(&self) -> &str {
        ASYNC_CONTINUATION
    }

    fn execute(&self, job: &Job, _configuration: Option<&str>, ctx: &mut CommandContext) -> Result<()> {
        let execution_id = owning_execution(job)?;
        ctx.require::<Execution>(execution_id)?;
        ctx.plan(Operation::ContinueProcess {
            execution_id: execution_id.to_string(),
        });
        Ok(())
    }
}

/// Moves the execution to the timer's activity and continues there
#[derive(Debug, Default, Clone, Copy)]
pub struct TriggerTimerJobHandler;

impl JobHandler for TriggerTimerJobHandler {
    fn handler_type(&self) -> &str {
        TRIGGER_TIMER
    }

    fn execute(&self, job: &Job, configuration: Option<&str>, ctx: &mut CommandContext) -> Result<()> {
        let execution_id = owning_execution(job)?;
        let configuration = TimerJobConfiguration::parse(configuration.unwrap_or_default());
        let activity_id = configuration
            .activity_id
            .filter(|a| !a.is_empty())
            .or_else(|| job.element_id.clone())
            .ok_or_else(|| ProcxError::InvalidTimer {
                expression: job.handler_configuration.clone().unwrap_or_default(),
                reason: "timer configuration names no activity".to_string(),
            })?;

        ctx.require_mut::<Execution>(execution_id)?.activity_id = Some(activity_id.clone());
        ctx.fire(EngineEvent::TimerFired {
            job_id: job.id.clone(),
            element_id: Some(activity_id),
        });
        ctx.plan(Operation::ContinueProcess {
            execution_id: execution_id.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_builtin_handler_types() {
        let registry = JobHandlerRegistry::with_defaults();
        assert_eq!(
            registry.handler_types(),
            vec!["async-continuation", "async-history", "trigger-timer"]
        );
        assert!(registry.get("unknown").is_none());
    }
}
