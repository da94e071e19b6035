//! procx engine - orchestration layer
//!
//! Wires configuration, storage and collaborators into a `ProcessEngine` and
//! runs the background job executors on tokio.
//!
//! ## Logging Ownership
//!
//! Every command logs its lifecycle through the core `CommandExecutor`.
//! Executor loops add `info!` on start/stop and `warn!` on failed jobs;
//! everything else is `debug!`.

pub mod engine;
pub mod executor;

pub use engine::{ProcessEngine, ProcessEngineBuilder};
pub use executor::{AsyncJobExecutor, CycleReport, ExecutorHandle};
