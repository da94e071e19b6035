//! Executor host command

use super::{ensure_parent, DEFAULT_DB};
use clap::Args;
use procx_engine::ProcessEngine;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// TOML engine configuration; defaults apply when absent
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long, default_value = DEFAULT_DB)]
    pub db: String,
}

pub fn execute(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    ensure_parent(&args.db)?;
    let mut builder = ProcessEngine::builder().with_logging().sqlite(&args.db)?;
    if let Some(path) = &args.config {
        builder = builder.config_file(path)?;
    }
    let engine = builder.build()?;

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async {
        let handle = engine.start_executors();
        println!("Executors running ({} tasks); press Ctrl-C to stop", handle.task_count());
        let signal = tokio::signal::ctrl_c().await;
        handle.shutdown().await;
        signal
    })?;
    println!("Executors stopped");
    Ok(())
}
