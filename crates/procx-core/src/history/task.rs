use super::activity::find_unfinished_activity;
use super::fact::{parse_fact, TaskFact, TASK_CREATED, TASK_ENDED};
use super::transformer::{accepts, HistoryJsonTransformer};
use crate::context::CommandContext;
use crate::errors::Result;
use crate::model::{duration_between, HistoricActivityInstance, HistoricTaskInstance, Job};
use serde_json::Value;

/// Copy the timestamp-guarded field set of `fact` onto `record`
fn apply_mutable_fields(record: &mut HistoricTaskInstance, fact: &TaskFact) {
    record.name = fact.name.clone();
    record.parent_task_id = fact.parent_task_id.clone();
    record.description = fact.description.clone();
    record.owner = fact.owner.clone();
    record.assignee = fact.assignee.clone();
    record.start_time = fact.start_time;
    record.task_definition_key = fact.task_definition_key.clone();
    record.priority = fact.priority;
    record.due_date = fact.due_date;
    record.category = fact.category.clone();
    record.form_key = fact.form_key.clone();
    record.claim_time = fact.claim_time;
    record.tenant_id = fact.tenant_id.clone();
}

fn apply_terminal_fields(record: &mut HistoricTaskInstance, fact: &TaskFact) {
    record.end_time = fact.end_time;
    record.delete_reason = fact.delete_reason.clone();
    record.duration_in_millis = duration_between(record.start_time, record.end_time);
}

/// Update the record of `fact.id` under the timestamp guard, or create it
///
/// Returns `true` when a new record was created. On creation the unfinished
/// activity instance of the fact's execution and activity gets its task id.
fn upsert_task(ctx: &mut CommandContext, fact: &TaskFact, terminal: bool) -> Result<bool> {
    if let Some(record) = ctx.find_by_id_mut::<HistoricTaskInstance>(&fact.id)? {
        if accepts(record.last_updated_time, fact.timestamp) {
            record.last_updated_time = Some(fact.timestamp);
            apply_mutable_fields(record, fact);
            record.duration_in_millis = duration_between(record.start_time, record.end_time);
        }
        if terminal {
            apply_terminal_fields(record, fact);
        }
        return Ok(false);
    }

    let mut record = HistoricTaskInstance {
        process_definition_id: fact.process_definition_id.clone(),
        process_instance_id: fact.process_instance_id.clone(),
        execution_id: fact.execution_id.clone(),
        last_updated_time: Some(fact.timestamp),
        ..HistoricTaskInstance::new(fact.id.clone())
    };
    apply_mutable_fields(&mut record, fact);
    if terminal {
        apply_terminal_fields(&mut record, fact);
    }
    ctx.insert(record)?;

    let execution_id = fact.execution_id.as_deref().filter(|s| !s.is_empty());
    let activity_id = fact.activity_id.as_deref().filter(|s| !s.is_empty());
    if let (Some(execution_id), Some(activity_id)) = (execution_id, activity_id) {
        if let Some(activity) = find_unfinished_activity(ctx, execution_id, activity_id)? {
            ctx.require_mut::<HistoricActivityInstance>(&activity.id)?.task_id = Some(fact.id.clone());
        }
    }
    Ok(true)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TaskCreatedTransformer;

impl HistoryJsonTransformer for TaskCreatedTransformer {
    fn types(&self) -> &[&'static str] {
        &[TASK_CREATED]
    }

    fn is_applicable(&self, _fact: &Value, _ctx: &mut CommandContext) -> Result<bool> {
        Ok(true)
    }

    fn transform(&self, _job: &Job, fact: &Value, ctx: &mut CommandContext) -> Result<()> {
        let fact: TaskFact = parse_fact(fact)?;
        upsert_task(ctx, &fact, false)?;
        Ok(())
    }
}

/// Applies `task-ended`; the end time and delete reason always win
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskEndedTransformer;

impl HistoryJsonTransformer for TaskEndedTransformer {
    fn types(&self) -> &[&'static str] {
        &[TASK_ENDED]
    }

    fn is_applicable(&self, _fact: &Value, _ctx: &mut CommandContext) -> Result<bool> {
        Ok(true)
    }

    fn transform(&self, job: &Job, fact: &Value, ctx: &mut CommandContext) -> Result<()> {
        let fact: TaskFact = parse_fact(fact)?;
        let created = upsert_task(ctx, &fact, true)?;
        tracing::trace!(job_id = %job.id, task_id = %fact.id, created, "task-ended fact applied");
        Ok(())
    }
}
