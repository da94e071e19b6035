//! Commands accepted by the `CommandExecutor`
//!
//! Each command runs in its own unit of work through `apply()`.

use crate::form::{FormModel, FormModelRequest};
use crate::history::ReplaySummary;
use crate::model::JobKind;
use serde_json::{Map, Value};

#[derive(Debug, Clone)]
pub enum Command {
    /// Create a process instance positioned at `start_activity_id` and run it
    StartProcessInstance {
        process_definition_id: String,
        start_activity_id: String,
        tenant_id: Option<String>,
        variables: Map<String, Value>,
    },

    /// Fan an execution out into `instances` multi-instance children
    StartMultiInstance { execution_id: String, instances: u32 },

    /// Continue one multi-instance child with its loop counter
    ContinueMultiInstance {
        execution_id: String,
        loop_counter: i64,
    },

    /// Lock due jobs of one kind for an executor
    AcquireJobs {
        kind: JobKind,
        lock_owner: String,
        lock_time_ms: u64,
        max_jobs: usize,
    },

    ExecuteJob { job_id: String },

    /// Record a failed attempt; a job without retries left becomes dead letter
    HandleFailedJob {
        job_id: String,
        message: String,
        detail: Option<String>,
    },

    /// Release the lock of an acquired job that was not executed
    UnacquireJob { job_id: String },

    /// Release expired locks, at most `batch_size` per run
    ResetExpiredJobs { batch_size: usize },

    /// Turn due timers into executable jobs, at most `batch_size` per run
    MoveDueTimers { batch_size: usize },

    MoveJobToDeadLetter { job_id: String },

    MoveDeadLetterJobToExecutable { job_id: String, retries: i32 },

    SuspendJob { job_id: String },

    ActivateJob { job_id: String },

    DeleteJob { job_id: String },

    UpdateJobTenantForDeployment {
        deployment_id: String,
        tenant_id: Option<String>,
    },

    /// Apply history facts directly, outside any history job
    ReplayHistoryFacts { facts: Vec<Value> },

    GetFormModel { request: FormModelRequest },
}

impl Command {
    /// Operation name used in the op start/end log events
    pub fn op_name(&self) -> &'static str {
        match self {
            Command::StartProcessInstance { .. } => "start_process_instance",
            Command::StartMultiInstance { .. } => "start_multi_instance",
            Command::ContinueMultiInstance { .. } => "continue_multi_instance",
            Command::AcquireJobs { .. } => "acquire_jobs",
            Command::ExecuteJob { .. } => "execute_job",
            Command::HandleFailedJob { .. } => "handle_failed_job",
            Command::UnacquireJob { .. } => "unacquire_job",
            Command::ResetExpiredJobs { .. } => "reset_expired_jobs",
            Command::MoveDueTimers { .. } => "move_due_timers",
            Command::MoveJobToDeadLetter { .. } => "move_job_to_dead_letter",
            Command::MoveDeadLetterJobToExecutable { .. } => "move_dead_letter_job_to_executable",
            Command::SuspendJob { .. } => "suspend_job",
            Command::ActivateJob { .. } => "activate_job",
            Command::DeleteJob { .. } => "delete_job",
            Command::UpdateJobTenantForDeployment { .. } => "update_job_tenant_for_deployment",
            Command::ReplayHistoryFacts { .. } => "replay_history_facts",
            Command::GetFormModel { .. } => "get_form_model",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Done,
    ProcessInstance { id: String },
    Executions(Vec<String>),
    JobIds(Vec<String>),
    /// Id of the job a move produced; `None` when its execution was gone
    MovedJob(Option<String>),
    Count(usize),
    Replayed(ReplaySummary),
    FormModel(Box<FormModel>),
}

impl CommandOutcome {
    pub fn job_ids(self) -> Vec<String> {
        match self {
            CommandOutcome::JobIds(ids) | CommandOutcome::Executions(ids) => ids,
            CommandOutcome::MovedJob(id) => id.into_iter().collect(),
            _ => Vec::new(),
        }
    }
}
