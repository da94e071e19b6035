//! procx core - process execution runtime
//!
//! This crate provides the transactional heart of the engine:
//! - Entities with revision-based optimistic locking and a per-unit-of-work cache
//! - `CommandContext` (unit of work) with its agenda of operations
//! - The job manager: insert/delete with cascading cleanup, acquisition,
//!   retries, dead letters, timers and suspension
//! - The async history pipeline with timestamp-guarded transformers
//! - Form models pre-filled from submissions and variables
//! - Configuration, errors and the structured logging facility
//!
//! Storage sits behind the `Database` trait; `MemoryDatabase` is the
//! in-process implementation, `procx-store` the SQLite one.

pub mod agenda;
pub mod apply;
pub mod cache;
pub mod clock;
pub mod commands;
pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod form;
pub mod history;
pub mod job;
pub mod logging_facility;
pub mod model;
pub mod persistence;
pub mod process;

// Used by the logging macros
pub use procx_core_types;

pub use apply::apply;
pub use commands::{Command, CommandOutcome};
pub use config::{EngineConfig, ExecutorConfig};
pub use context::{CommandContext, CommandExecutor, EngineServices};
pub use errors::{ExError, ExErrorKind, ProcxError, Result};
pub use model::{ByteArray, ByteArrayRef, Execution, HistoricActivityInstance, HistoricTaskInstance, Job, JobKind};
pub use persistence::{Database, MemoryDatabase};
