//! Async history
//!
//! Units of work record facts; commit queues them as one history job; the
//! history executor later replays each fact through the transformer
//! registered for its type. Replay tolerates duplicate and out-of-order
//! delivery through a per-record timestamp guard.

mod activity;
mod fact;
mod job_handler;
mod manager;
mod task;
mod transformer;

pub use activity::{ActivityEndTransformer, ActivityStartTransformer};
pub use fact::{
    fact_document, fact_type, parse_fact, ActivityFact, TaskFact, ACTIVITY_END, ACTIVITY_START, TASK_CREATED,
    TASK_ENDED, TYPE_FIELD,
};
pub use job_handler::{load_facts, replay, AsyncHistoryJobHandler, ReplaySummary};
pub use manager::{record_activity_end, record_activity_start, record_task_created, record_task_ended, HistoryManager};
pub use task::{TaskCreatedTransformer, TaskEndedTransformer};
pub use transformer::{HistoryJsonTransformer, TransformerRegistry};
