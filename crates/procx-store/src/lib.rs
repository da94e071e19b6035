//! procx store - SQLite persistence for the process runtime
//!
//! Provides:
//! - Connection setup and schema migrations with checksums
//! - `SqliteDatabase`, the durable implementation of `procx_core::Database`

pub mod db;
pub mod errors;
pub mod migrations;
pub mod sqlite_db;

pub use sqlite_db::SqliteDatabase;
