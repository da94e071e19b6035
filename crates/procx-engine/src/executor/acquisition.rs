use super::ExecutorHandle;
use procx_core::{apply, Command, CommandExecutor, CommandOutcome, ExecutorConfig, JobKind, ProcxError, Result};
use procx_core_types::TraceId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

/// Result of one acquisition cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub acquired: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs given back after losing a concurrent update
    pub unacquired: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobResult {
    Succeeded,
    Failed,
    Unacquired,
}

/// Acquires and executes jobs of one kind
#[derive(Clone)]
pub struct AsyncJobExecutor {
    executor: CommandExecutor,
    kind: JobKind,
    config: ExecutorConfig,
    lock_owner: String,
    workers: Arc<Semaphore>,
}

impl AsyncJobExecutor {
    pub fn new(executor: CommandExecutor, kind: JobKind, config: ExecutorConfig) -> Self {
        let lock_owner = config
            .lock_owner
            .clone()
            .unwrap_or_else(|| format!("procx-{}", uuid::Uuid::new_v4()));
        let workers = Arc::new(Semaphore::new(config.worker_count.max(1)));
        Self {
            executor,
            kind,
            config,
            lock_owner,
            workers,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn lock_owner(&self) -> &str {
        &self.lock_owner
    }

    /// Run `command` in its own unit of work on the blocking pool
    async fn run_command(&self, command: Command, trace_id: Option<TraceId>) -> Result<CommandOutcome> {
        let executor = self.executor.clone();
        tokio::task::spawn_blocking(move || {
            let op = command.op_name();
            executor.execute_traced(op, trace_id, |ctx| apply(ctx, command))
        })
        .await
        .map_err(|e| ProcxError::Internal {
            message: format!("blocking task failed: {}", e),
        })?
    }

    /// Acquire one batch of due jobs and execute it to completion
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let trace_id = TraceId::new();
        let outcome = self
            .run_command(
                Command::AcquireJobs {
                    kind: self.kind,
                    lock_owner: self.lock_owner.clone(),
                    lock_time_ms: self.config.lock_time_ms,
                    max_jobs: self.config.max_jobs_per_acquisition,
                },
                Some(trace_id.clone()),
            )
            .await?;
        let job_ids = outcome.job_ids();
        let mut report = CycleReport {
            acquired: job_ids.len(),
            ..CycleReport::default()
        };
        if job_ids.is_empty() {
            return Ok(report);
        }
        tracing::debug!(kind = %self.kind, acquired = job_ids.len(), trace_id = %trace_id, "jobs acquired");

        let mut running = JoinSet::new();
        for job_id in job_ids {
            let permit = Arc::clone(&self.workers)
                .acquire_owned()
                .await
                .map_err(|e| ProcxError::Internal {
                    message: format!("worker pool closed: {}", e),
                })?;
            let worker = self.clone();
            let trace_id = trace_id.clone();
            running.spawn(async move {
                let result = worker.execute_one(job_id, trace_id).await;
                drop(permit);
                result
            });
        }

        while let Some(joined) = running.join_next().await {
            match joined {
                Ok(JobResult::Succeeded) => report.succeeded += 1,
                Ok(JobResult::Failed) => report.failed += 1,
                Ok(JobResult::Unacquired) => report.unacquired += 1,
                Err(e) => {
                    tracing::error!(error = %e, "job worker task panicked");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Execute one acquired job and record its failure, if any
    ///
    /// A concurrent update gives the job back untouched; any other error
    /// decrements its retries in a separate unit of work.
    async fn execute_one(&self, job_id: String, trace_id: TraceId) -> JobResult {
        let result = self
            .run_command(Command::ExecuteJob { job_id: job_id.clone() }, Some(trace_id.clone()))
            .await;
        let err = match result {
            Ok(_) => return JobResult::Succeeded,
            Err(err) => err,
        };

        let (follow_up, job_result) = if err.is_optimistic_lock() {
            (Command::UnacquireJob { job_id: job_id.clone() }, JobResult::Unacquired)
        } else {
            tracing::warn!(job_id = %job_id, error = %err, "job execution failed");
            (
                Command::HandleFailedJob {
                    job_id: job_id.clone(),
                    message: err.to_string(),
                    detail: Some(format!("{:?}", err)),
                },
                JobResult::Failed,
            )
        };
        if let Err(e) = self.run_command(follow_up, Some(trace_id)).await {
            tracing::error!(job_id = %job_id, error = %e, "could not record job failure");
        }
        job_result
    }

    /// Release locks that expired; returns the ids reset
    pub async fn reset_expired(&self) -> Result<Vec<String>> {
        let outcome = self
            .run_command(
                Command::ResetExpiredJobs {
                    batch_size: self.config.reset_expired_batch_size,
                },
                None,
            )
            .await?;
        Ok(outcome.job_ids())
    }

    /// Move due timers to the executable table; returns the new job ids
    pub async fn move_due_timers(&self) -> Result<Vec<String>> {
        let outcome = self
            .run_command(
                Command::MoveDueTimers {
                    batch_size: self.config.max_jobs_per_acquisition,
                },
                None,
            )
            .await?;
        Ok(outcome.job_ids())
    }

    /// Acquisition loop until shutdown
    ///
    /// A cycle that found a full batch runs again immediately; otherwise the
    /// loop waits `acquire_wait_ms`.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::info!(kind = %self.kind, lock_owner = %self.lock_owner, "job executor started");
        let wait = Duration::from_millis(self.config.acquire_wait_ms);

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            if self.kind == JobKind::Async {
                if let Err(e) = self.move_due_timers().await {
                    tracing::warn!(error = %e, "moving due timers failed");
                }
            }
            let busy = match self.run_cycle().await {
                Ok(report) => report.acquired >= self.config.max_jobs_per_acquisition,
                Err(e) => {
                    tracing::warn!(kind = %self.kind, error = %e, "job acquisition failed");
                    false
                }
            };
            if busy {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown_rx.changed() => break,
            }
        }

        tracing::info!(kind = %self.kind, "job executor stopped");
    }

    /// Expired-lock reset loop until shutdown
    pub async fn run_reset_expired(self, mut shutdown_rx: watch::Receiver<bool>) {
        let interval = Duration::from_millis(self.config.reset_expired_interval_ms);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown_rx.changed() => break,
            }
            if *shutdown_rx.borrow() {
                break;
            }
            match self.reset_expired().await {
                Ok(ids) if !ids.is_empty() => {
                    tracing::info!(kind = %self.kind, count = ids.len(), "expired job locks reset")
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "resetting expired jobs failed"),
            }
        }
    }

    /// Spawn this executor's loops onto the current runtime
    pub fn spawn_into(self, handle: &mut ExecutorHandle) {
        let reset = self.clone();
        handle.push(tokio::spawn(reset.run_reset_expired(handle.subscribe())));
        handle.push(tokio::spawn(self.run(handle.subscribe())));
    }
}
