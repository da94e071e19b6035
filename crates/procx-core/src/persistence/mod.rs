//! Persistence boundary
//!
//! The core never issues storage queries itself. Entities are stored as JSON
//! documents keyed by (kind, id); reads go through typed `Criteria` and writes
//! are batched into one atomic `flush` per unit of work.

mod criteria;
mod database;
mod job_data;
mod memory;

pub use criteria::{Condition, Criteria, Page, SortOrder};
pub use database::{decode_rows, Database, FlushOp};
pub use job_data::{JobDataManager, JobQuery};
pub use memory::MemoryDatabase;
