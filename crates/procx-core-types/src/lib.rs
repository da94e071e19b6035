//! Core types shared across procx crates
//!
//! - **Correlation types**: `RequestId`, `TraceId`, `RequestContext`
//! - **Diagnostic context**: execution/job identifiers attached to log events and errors
//! - **Schema constants**: canonical field keys and event names

pub mod correlation;
pub mod diagnostic;
pub mod schema;

pub use correlation::{RequestContext, RequestId, TraceId};
pub use diagnostic::DiagnosticContext;
