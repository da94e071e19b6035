//! Error helpers for procx-store
//!
//! Storage failures surface as `ProcxError` so the core can treat every
//! `Database` implementation alike.

use procx_core::errors::ProcxError;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ProcxError {
    ProcxError::Migration {
        migration_id: migration_id.to_string(),
        reason: reason.to_string(),
    }
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ProcxError {
    migration_error(
        migration_id,
        &format!("checksum mismatch: recorded {}, embedded {}", expected, actual),
    )
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ProcxError {
    ProcxError::Persistence {
        message: err.to_string(),
    }
}

pub fn corrupt_row(kind: &str, id: &str, err: serde_json::Error) -> ProcxError {
    ProcxError::Persistence {
        message: format!("stored {} {} is not valid JSON: {}", kind, id, err),
    }
}
