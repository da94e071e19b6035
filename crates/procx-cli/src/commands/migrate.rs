//! Schema migration command

use super::{ensure_parent, DEFAULT_DB};
use clap::Args;

#[derive(Debug, Args)]
pub struct MigrateArgs {
    #[arg(long, default_value = DEFAULT_DB)]
    pub db: String,
}

pub fn execute(args: MigrateArgs) -> Result<(), Box<dyn std::error::Error>> {
    ensure_parent(&args.db)?;
    let mut conn = procx_store::db::open(&args.db)?;
    procx_store::migrations::apply_migrations(&mut conn)?;

    println!("Migrations applied:");
    for (id, checksum) in procx_store::migrations::applied_migrations(&conn)? {
        println!("  {} {}", id, &checksum[..checksum.len().min(12)]);
    }
    Ok(())
}
