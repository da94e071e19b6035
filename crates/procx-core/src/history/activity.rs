use super::fact::{parse_fact, ActivityFact, ACTIVITY_END, ACTIVITY_START};
use super::transformer::{accepts, HistoryJsonTransformer};
use crate::cache::MatchFn;
use crate::context::CommandContext;
use crate::errors::Result;
use crate::model::{duration_between, HistoricActivityInstance, Job};
use crate::persistence::Criteria;
use serde_json::Value;

/// Unfinished activity instance of `activity_id` in `execution_id`, if any
///
/// Sees instances created earlier in the same unit of work.
pub(crate) fn find_unfinished_activity(
    ctx: &mut CommandContext,
    execution_id: &str,
    activity_id: &str,
) -> Result<Option<HistoricActivityInstance>> {
    let criteria = Criteria::new()
        .eq("execution_id", execution_id)
        .eq("activity_id", activity_id)
        .is_null("end_time");
    let unfinished = MatchFn(|a: &HistoricActivityInstance, key: &(String, String)| {
        a.execution_id.as_deref() == Some(key.0.as_str())
            && a.activity_id.as_deref() == Some(key.1.as_str())
            && a.end_time.is_none()
    });
    let key = (execution_id.to_string(), activity_id.to_string());
    let found = ctx.select(&criteria, &unfinished, &key)?;
    // a row may have been finished in this unit of work after it was loaded
    Ok(found.into_iter().find(|a| !a.is_finished()))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ActivityStartTransformer;

impl HistoryJsonTransformer for ActivityStartTransformer {
    fn types(&self) -> &[&'static str] {
        &[ACTIVITY_START]
    }

    fn is_applicable(&self, _fact: &Value, _ctx: &mut CommandContext) -> Result<bool> {
        Ok(true)
    }

    fn transform(&self, _job: &Job, fact: &Value, ctx: &mut CommandContext) -> Result<()> {
        let fact: ActivityFact = parse_fact(fact)?;
        let existing = match &fact.id {
            Some(id) => ctx.find_by_id::<HistoricActivityInstance>(id)?.cloned(),
            None => find_unfinished_activity(ctx, &fact.execution_id, &fact.activity_id)?,
        };

        match existing {
            Some(instance) => {
                let record = ctx.require_mut::<HistoricActivityInstance>(&instance.id)?;
                if accepts(record.last_updated_time, fact.timestamp) {
                    record.last_updated_time = Some(fact.timestamp);
                    record.activity_name = fact.activity_name;
                    record.activity_type = fact.activity_type;
                    record.start_time = fact.start_time;
                    record.tenant_id = fact.tenant_id;
                    record.duration_in_millis = duration_between(record.start_time, record.end_time);
                }
            }
            None => {
                let id = fact.id.clone().unwrap_or_else(|| ctx.new_id());
                let record = HistoricActivityInstance {
                    process_definition_id: fact.process_definition_id,
                    process_instance_id: fact.process_instance_id,
                    execution_id: Some(fact.execution_id),
                    activity_id: Some(fact.activity_id),
                    activity_name: fact.activity_name,
                    activity_type: fact.activity_type,
                    tenant_id: fact.tenant_id,
                    start_time: fact.start_time,
                    last_updated_time: Some(fact.timestamp),
                    ..HistoricActivityInstance::new(id)
                };
                ctx.insert(record)?;
            }
        }
        Ok(())
    }
}

/// Finishes the open activity instance; waits until the start fact created it
#[derive(Debug, Default, Clone, Copy)]
pub struct ActivityEndTransformer;

impl HistoryJsonTransformer for ActivityEndTransformer {
    fn types(&self) -> &[&'static str] {
        &[ACTIVITY_END]
    }

    fn is_applicable(&self, fact: &Value, ctx: &mut CommandContext) -> Result<bool> {
        let fact: ActivityFact = parse_fact(fact)?;
        Ok(find_unfinished_activity(ctx, &fact.execution_id, &fact.activity_id)?.is_some())
    }

    fn transform(&self, _job: &Job, fact: &Value, ctx: &mut CommandContext) -> Result<()> {
        let fact: ActivityFact = parse_fact(fact)?;
        let Some(instance) = find_unfinished_activity(ctx, &fact.execution_id, &fact.activity_id)? else {
            return Ok(());
        };
        let record = ctx.require_mut::<HistoricActivityInstance>(&instance.id)?;
        if accepts(record.last_updated_time, fact.timestamp) {
            record.last_updated_time = Some(fact.timestamp);
        }
        record.end_time = fact.end_time;
        record.delete_reason = fact.delete_reason;
        record.duration_in_millis = duration_between(record.start_time, record.end_time);
        Ok(())
    }
}
