use super::fact::{fact_document, ActivityFact, TaskFact, ACTIVITY_END, ACTIVITY_START, TASK_CREATED, TASK_ENDED};
use crate::context::CommandContext;
use crate::errors::Result;
use crate::model::Execution;
use crate::process::FlowNode;
use serde_json::Value;

/// History facts recorded by one unit of work, queued as a history job at commit
#[derive(Debug, Default)]
pub struct HistoryManager {
    enabled: bool,
    pending: Vec<Value>,
}

impl HistoryManager {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            pending: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Queue a fact document; ignored when async history is disabled
    pub fn record(&mut self, fact: Value) {
        if self.enabled {
            self.pending.push(fact);
        }
    }

    pub fn pending(&self) -> &[Value] {
        &self.pending
    }

    pub fn take_pending(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.pending)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

fn activity_fact(ctx: &CommandContext, execution: &Execution, activity_id: &str) -> ActivityFact {
    ActivityFact {
        id: None,
        timestamp: ctx.now(),
        execution_id: execution.id.clone(),
        activity_id: activity_id.to_string(),
        process_definition_id: Some(execution.process_definition_id.clone()),
        process_instance_id: Some(execution.process_instance_id.clone()),
        tenant_id: execution.tenant_id.clone(),
        ..ActivityFact::default()
    }
}

/// Record that `execution` entered `node`
pub fn record_activity_start(ctx: &mut CommandContext, execution: &Execution, node: &FlowNode) -> Result<()> {
    if !ctx.history().is_enabled() {
        return Ok(());
    }
    let fact = ActivityFact {
        id: Some(ctx.new_id()),
        activity_name: node.name.clone(),
        activity_type: Some(node.behavior.name().to_string()),
        start_time: Some(ctx.now()),
        ..activity_fact(ctx, execution, &node.id)
    };
    let doc = fact_document(ACTIVITY_START, &fact)?;
    ctx.history_mut().record(doc);
    Ok(())
}

/// Record that `execution` left `activity_id`
pub fn record_activity_end(
    ctx: &mut CommandContext,
    execution: &Execution,
    activity_id: &str,
    delete_reason: Option<&str>,
) -> Result<()> {
    if !ctx.history().is_enabled() {
        return Ok(());
    }
    let fact = ActivityFact {
        end_time: Some(ctx.now()),
        delete_reason: delete_reason.map(str::to_string),
        ..activity_fact(ctx, execution, activity_id)
    };
    let doc = fact_document(ACTIVITY_END, &fact)?;
    ctx.history_mut().record(doc);
    Ok(())
}

pub fn record_task_created(ctx: &mut CommandContext, fact: &TaskFact) -> Result<()> {
    if !ctx.history().is_enabled() {
        return Ok(());
    }
    let doc = fact_document(TASK_CREATED, fact)?;
    ctx.history_mut().record(doc);
    Ok(())
}

pub fn record_task_ended(ctx: &mut CommandContext, fact: &TaskFact) -> Result<()> {
    if !ctx.history().is_enabled() {
        return Ok(());
    }
    let doc = fact_document(TASK_ENDED, fact)?;
    ctx.history_mut().record(doc);
    Ok(())
}
