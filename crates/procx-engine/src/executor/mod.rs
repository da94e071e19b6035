//! Background job executors
//!
//! One `AsyncJobExecutor` serves one job kind. Each runs three loops until
//! shutdown: acquisition (lock due jobs, execute them on a bounded worker
//! pool), expired-lock reset, and, for async jobs, moving due timers to the
//! executable table. Every step is its own unit of work; blocking storage
//! calls run on tokio's blocking pool.

mod acquisition;
mod handle;

pub use acquisition::{AsyncJobExecutor, CycleReport};
pub use handle::ExecutorHandle;
