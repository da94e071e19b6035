//! Canonical schema constants for structured logging

pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_TRACE_ID: &str = "trace_id";

// Runtime identifiers
pub const FIELD_EXECUTION_ID: &str = "execution_id";
pub const FIELD_PROCESS_INSTANCE_ID: &str = "process_instance_id";
pub const FIELD_JOB_ID: &str = "job_id";
pub const FIELD_FACT_TYPE: &str = "fact_type";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
