//! Unit of work
//!
//! `CommandContext` is the transactional envelope of one command: one entity
//! cache, one agenda and the history facts produced along the way, committed
//! or rolled back together. `CommandExecutor` creates a context per command.

mod command_context;
mod executor;
mod services;

pub use command_context::{CommandContext, CommitSummary, ASYNC_HISTORY_HANDLER, HISTORY_PAYLOAD_NAME};
pub use executor::CommandExecutor;
pub use services::{EngineServices, EngineServicesBuilder, FormServices};
