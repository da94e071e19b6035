//! Job inspection and repair commands

use super::{open_engine, DEFAULT_DB};
use clap::{Args, Subcommand};
use procx_core::job;
use procx_core::persistence::JobQuery;
use procx_core::{Command, CommandOutcome, JobKind};

#[derive(Debug, Args)]
pub struct JobsArgs {
    #[command(subcommand)]
    pub command: JobsCommand,
}

#[derive(Debug, Subcommand)]
pub enum JobsCommand {
    /// List jobs, optionally of one kind
    List(ListArgs),
    /// Make a dead-letter job executable again
    Retry(RetryArgs),
    /// Delete a job and its stored payloads
    Delete(DeleteArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// async, timer, suspended, dead_letter or history
    #[arg(long)]
    pub kind: Option<JobKind>,

    #[arg(long, default_value = DEFAULT_DB)]
    pub db: String,
}

#[derive(Debug, Args)]
pub struct RetryArgs {
    pub job_id: String,

    #[arg(long, default_value_t = 3)]
    pub retries: i32,

    #[arg(long, default_value = DEFAULT_DB)]
    pub db: String,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    pub job_id: String,

    #[arg(long, default_value = DEFAULT_DB)]
    pub db: String,
}

pub fn execute(args: JobsArgs) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        JobsCommand::List(list_args) => execute_list(list_args),
        JobsCommand::Retry(retry_args) => execute_retry(retry_args),
        JobsCommand::Delete(delete_args) => execute_delete(delete_args),
    }
}

fn execute_list(args: ListArgs) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine(&args.db)?;
    let mut query = JobQuery::new();
    if let Some(kind) = args.kind {
        query = query.kind(kind);
    }
    let jobs = engine
        .command_executor()
        .execute("list_jobs", |ctx| job::query(ctx, &query, None))?;

    if jobs.is_empty() {
        println!("No jobs");
        return Ok(());
    }
    println!("{:<38} {:<12} {:<20} {:>7}  error", "id", "kind", "handler", "retries");
    for j in jobs {
        println!(
            "{:<38} {:<12} {:<20} {:>7}  {}",
            j.id,
            j.kind,
            j.handler_type,
            j.retries,
            j.exception_message.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn execute_retry(args: RetryArgs) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine(&args.db)?;
    let outcome = engine.apply(Command::MoveDeadLetterJobToExecutable {
        job_id: args.job_id.clone(),
        retries: args.retries,
    })?;
    match outcome {
        CommandOutcome::MovedJob(Some(new_id)) => {
            println!("Job {} is executable again as {}", args.job_id, new_id);
        }
        _ => println!("Job {} removed; its execution no longer exists", args.job_id),
    }
    Ok(())
}

fn execute_delete(args: DeleteArgs) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine(&args.db)?;
    engine.apply(Command::DeleteJob {
        job_id: args.job_id.clone(),
    })?;
    println!("Job {} deleted", args.job_id);
    Ok(())
}
