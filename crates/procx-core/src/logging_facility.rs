//! Structured logging facility
//!
//! - Single initialization point via `init(profile)`
//! - Structured logging macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//! - Test capture mode for deterministic assertions
//!
//! ```rust
//! use procx_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```
//!
//! Every command executed through `CommandExecutor` logs exactly one start and
//! one end (or end_error) event. Operations and history transformers add the
//! execution/job identifiers from the unit of work's diagnostic context.

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
