//! Jobs: deferred units of work and their lifecycle

mod handlers;
mod manager;
mod timer;

pub use handlers::{AsyncContinuationJobHandler, JobHandler, JobHandlerRegistry, TriggerTimerJobHandler};
pub use manager::{
    acquire_jobs, activate, count, create_async_job, create_timer_job, delete, execute_job, find_by_execution,
    find_by_process_instance, find_due, find_due_timers, find_expired, handle_failed_job, insert, move_dead_letter_to_executable,
    move_timer_to_executable, move_to_dead_letter, move_to_suspended, query, reset_expired, schedule_async_job,
    unacquire, update_tenant_id_for_deployment, JobsByExecution, JobsByProcessInstance, ASYNC_CONTINUATION,
    EXCEPTION_NAME, MAX_EXCEPTION_MESSAGE_LENGTH, TRIGGER_TIMER,
};
pub use timer::{parse_duration, RepeatExpression, TimerJobConfiguration};
