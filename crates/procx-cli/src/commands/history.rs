//! History fact replay command

use super::{open_engine, DEFAULT_DB};
use clap::{Args, Subcommand};
use procx_core::{Command, CommandOutcome};
use serde_json::Value;

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub command: HistoryCommand,
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// Apply a JSON file of history facts (an array or a single object)
    Replay(ReplayArgs),
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    #[arg(long)]
    pub file: String,

    #[arg(long, default_value = DEFAULT_DB)]
    pub db: String,
}

pub fn execute(args: HistoryArgs) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        HistoryCommand::Replay(replay_args) => execute_replay(replay_args),
    }
}

fn execute_replay(args: ReplayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(&args.file)?;
    let facts = match serde_json::from_str::<Value>(&text)? {
        Value::Array(facts) => facts,
        fact @ Value::Object(_) => vec![fact],
        _ => return Err("history file must hold a JSON object or array".into()),
    };

    let engine = open_engine(&args.db)?;
    match engine.apply(Command::ReplayHistoryFacts { facts })? {
        CommandOutcome::Replayed(summary) => {
            println!("History replayed:");
            println!("  applied: {}", summary.applied);
            println!("  skipped: {}", summary.skipped);
        }
        other => return Err(format!("unexpected outcome {:?}", other).into()),
    }
    Ok(())
}
