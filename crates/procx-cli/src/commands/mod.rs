pub mod history;
pub mod jobs;
pub mod migrate;
pub mod run;

use procx_engine::ProcessEngine;
use std::path::Path;

pub const DEFAULT_DB: &str = ".procx/procx.db";

/// Create the parent directory of `db` if it is missing
pub fn ensure_parent(db: &str) -> std::io::Result<()> {
    match Path::new(db).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Engine over the SQLite store at `db`
pub fn open_engine(db: &str) -> Result<ProcessEngine, Box<dyn std::error::Error>> {
    ensure_parent(db)?;
    Ok(ProcessEngine::builder().sqlite(db)?.build()?)
}
