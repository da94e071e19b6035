//! Persisted runtime and history entities

mod byte_array;
mod execution;
mod historic;
mod job;

pub use byte_array::{ByteArray, ByteArrayRef};
pub use execution::Execution;
pub use historic::{HistoricActivityInstance, HistoricTaskInstance};
pub(crate) use historic::duration_between;
pub use job::{Job, JobKind};
