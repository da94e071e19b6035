//! procx CLI
//!
//! Maintenance and executor commands for a SQLite-backed process store

use clap::{Parser, Subcommand};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "procx")]
#[command(about = "procx - process runtime maintenance", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create or upgrade the store schema
    Migrate(commands::migrate::MigrateArgs),
    /// Inspect and repair jobs
    Jobs(commands::jobs::JobsArgs),
    /// History fact operations
    History(commands::history::HistoryArgs),
    /// Run the job executors until interrupted
    Run(commands::run::RunArgs),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Migrate(args) => commands::migrate::execute(args),
        Commands::Jobs(args) => commands::jobs::execute(args),
        Commands::History(args) => commands::history::execute(args),
        Commands::Run(args) => commands::run::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
