//! Command dispatch inside one unit of work
//!
//! `apply()` mutates the context only; the `CommandExecutor` drains the
//! agenda and commits afterwards, or rolls everything back on error.

use crate::agenda::{plan_multi_instance, Operation};
use crate::commands::{Command, CommandOutcome};
use crate::context::{CommandContext, ASYNC_HISTORY_HANDLER};
use crate::errors::{ProcxError, Result};
use crate::form::get_form_model_with_variables;
use crate::history::replay;
use crate::job;
use crate::model::{Execution, Job, JobKind};
use crate::persistence::Page;

pub fn apply(ctx: &mut CommandContext, command: Command) -> Result<CommandOutcome> {
    match command {
        Command::StartProcessInstance {
            process_definition_id,
            start_activity_id,
            tenant_id,
            variables,
        } => {
            let definition = ctx.process_definition(&process_definition_id)?;
            if definition.flow_node(&start_activity_id).is_none() {
                return Err(ProcxError::programmatic(format!(
                    "Programmatic error: no flow node '{}' in process definition {}",
                    start_activity_id, definition.id
                )));
            }
            let mut instance = Execution::new_process_instance(ctx.new_id(), &definition.id)
                .with_activity(&start_activity_id)
                .with_count_enabled(ctx.config().counting_enabled);
            instance.tenant_id = tenant_id.or_else(|| definition.tenant_id.clone());
            instance.deployment_id = definition.deployment_id.clone();
            instance.start_time = Some(ctx.now());
            instance.variables.extend(variables);
            let id = instance.id.clone();
            ctx.insert(instance)?;
            ctx.plan(Operation::ContinueProcess {
                execution_id: id.clone(),
            });
            Ok(CommandOutcome::ProcessInstance { id })
        }

        Command::StartMultiInstance {
            execution_id,
            instances,
        } => Ok(CommandOutcome::Executions(plan_multi_instance(
            ctx,
            &execution_id,
            instances,
        )?)),

        Command::ContinueMultiInstance {
            execution_id,
            loop_counter,
        } => {
            ctx.plan(Operation::ContinueMultiInstance {
                execution_id,
                loop_counter,
            });
            Ok(CommandOutcome::Done)
        }

        Command::AcquireJobs {
            kind,
            lock_owner,
            lock_time_ms,
            max_jobs,
        } => Ok(CommandOutcome::JobIds(job::acquire_jobs(
            ctx,
            kind,
            &lock_owner,
            lock_time_ms,
            max_jobs,
        )?)),

        Command::ExecuteJob { job_id } => {
            job::execute_job(ctx, &job_id)?;
            Ok(CommandOutcome::Done)
        }

        Command::HandleFailedJob {
            job_id,
            message,
            detail,
        } => {
            job::handle_failed_job(ctx, &job_id, &message, detail)?;
            Ok(CommandOutcome::Done)
        }

        Command::UnacquireJob { job_id } => {
            job::unacquire(ctx, &job_id)?;
            Ok(CommandOutcome::Done)
        }

        Command::ResetExpiredJobs { batch_size } => {
            let expired = job::find_expired(ctx, Page::first(batch_size))?;
            let mut ids = Vec::with_capacity(expired.len());
            for expired_job in expired {
                job::reset_expired(ctx, &expired_job.id)?;
                ids.push(expired_job.id);
            }
            Ok(CommandOutcome::JobIds(ids))
        }

        Command::MoveDueTimers { batch_size } => {
            let timers = job::find_due_timers(ctx, Page::first(batch_size))?;
            let mut ids = Vec::with_capacity(timers.len());
            for timer in timers {
                if let Some(id) = job::move_timer_to_executable(ctx, &timer.id)? {
                    ids.push(id);
                }
            }
            Ok(CommandOutcome::JobIds(ids))
        }

        Command::MoveJobToDeadLetter { job_id } => Ok(CommandOutcome::MovedJob(job::move_to_dead_letter(
            ctx, &job_id,
        )?)),

        Command::MoveDeadLetterJobToExecutable { job_id, retries } => Ok(CommandOutcome::MovedJob(
            job::move_dead_letter_to_executable(ctx, &job_id, retries)?,
        )),

        Command::SuspendJob { job_id } => Ok(CommandOutcome::MovedJob(job::move_to_suspended(ctx, &job_id)?)),

        Command::ActivateJob { job_id } => Ok(CommandOutcome::MovedJob(job::activate(ctx, &job_id)?)),

        Command::DeleteJob { job_id } => {
            job::delete(ctx, &job_id, true)?;
            Ok(CommandOutcome::Done)
        }

        Command::UpdateJobTenantForDeployment {
            deployment_id,
            tenant_id,
        } => Ok(CommandOutcome::Count(job::update_tenant_id_for_deployment(
            ctx,
            &deployment_id,
            tenant_id.as_deref(),
        )?)),

        Command::ReplayHistoryFacts { facts } => {
            let carrier = Job::new(ctx.new_id(), JobKind::History, ASYNC_HISTORY_HANDLER);
            Ok(CommandOutcome::Replayed(replay(ctx, &carrier, &facts)?))
        }

        Command::GetFormModel { request } => {
            let forms = ctx.services().forms.clone().ok_or_else(|| ProcxError::InvalidConfig {
                message: "form services are not configured".to_string(),
            })?;
            let model = get_form_model_with_variables(&forms, request)?;
            Ok(CommandOutcome::FormModel(Box::new(model)))
        }
    }
}
