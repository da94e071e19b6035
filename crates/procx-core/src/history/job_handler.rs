use super::fact::fact_type;
use crate::context::{CommandContext, ASYNC_HISTORY_HANDLER};
use crate::errors::{ProcxError, Result};
use crate::job::JobHandler;
use crate::model::Job;
use serde_json::Value;

/// Counts of one history job replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub skipped: usize,
}

/// Executes history jobs by replaying their facts through the transformers
#[derive(Debug, Default, Clone, Copy)]
pub struct AsyncHistoryJobHandler;

impl JobHandler for AsyncHistoryJobHandler {
    fn handler_type(&self) -> &str {
        ASYNC_HISTORY_HANDLER
    }

    fn execute(&self, job: &Job, _configuration: Option<&str>, ctx: &mut CommandContext) -> Result<()> {
        let facts = load_facts(ctx, job)?;
        let summary = replay(ctx, job, &facts)?;
        tracing::debug!(
            job_id = %job.id,
            applied = summary.applied,
            skipped = summary.skipped,
            "history job replayed"
        );
        Ok(())
    }
}

/// Facts stored in the payload byte array of `job`
///
/// The payload is a JSON array of facts or a single fact object.
pub fn load_facts(ctx: &mut CommandContext, job: &Job) -> Result<Vec<Value>> {
    let payload = match &job.custom_values {
        Some(reference) => reference.bytes(ctx)?,
        None => None,
    };
    let payload = payload.ok_or_else(|| ProcxError::InvalidHistoryFact {
        message: format!("history job {} has no payload", job.id),
    })?;
    match serde_json::from_slice::<Value>(&payload)? {
        Value::Array(facts) => Ok(facts),
        fact @ Value::Object(_) => Ok(vec![fact]),
        other => Err(ProcxError::InvalidHistoryFact {
            message: format!("history payload must be an object or array, got {}", other),
        }),
    }
}

/// Apply `facts` in order
///
/// A fact without a registered transformer is skipped. A fact that is not
/// applicable yet fails the whole job with `HistoryJobNotApplicable`.
pub fn replay(ctx: &mut CommandContext, job: &Job, facts: &[Value]) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();
    for fact in facts {
        let fact_type = fact_type(fact)?;
        let Some(transformer) = ctx.services().transformers.get(fact_type) else {
            tracing::warn!(job_id = %job.id, fact_type, "no transformer for history fact; skipped");
            summary.skipped += 1;
            continue;
        };
        if !transformer.is_applicable(fact, ctx)? {
            return Err(ProcxError::HistoryJobNotApplicable {
                job_id: job.id.clone(),
                fact_type: fact_type.to_string(),
            });
        }
        transformer.transform(job, fact, ctx)?;
        summary.applied += 1;
    }
    Ok(summary)
}
