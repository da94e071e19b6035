use procx_core_types::{DiagnosticContext, RequestId};
use thiserror::Error;

/// Result type alias using ProcxError
pub type Result<T> = std::result::Result<T, ProcxError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code usable in logs, tests and external
/// responses. Kinds are coarser than `ProcxError` variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Lookup
    NotFound,
    AlreadyExists,

    // Process execution
    Programmatic,
    BusinessFault,
    UnhandledBusinessFault,
    Runtime,
    Expression,

    // Jobs and history
    HandlerNotFound,
    NotApplicable,
    InvalidHistoryFact,
    InvalidTimer,

    // Input/config
    InvalidInput,
    InvalidQuery,
    InvalidConfig,

    // Integration/IO
    Io,
    Serialization,
    Persistence,
    Concurrency,

    // Internal
    ContextClosed,
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            ExErrorKind::Programmatic => "ERR_PROGRAMMATIC",
            ExErrorKind::BusinessFault => "ERR_BUSINESS_FAULT",
            ExErrorKind::UnhandledBusinessFault => "ERR_UNHANDLED_BUSINESS_FAULT",
            ExErrorKind::Runtime => "ERR_RUNTIME",
            ExErrorKind::Expression => "ERR_EXPRESSION",
            ExErrorKind::HandlerNotFound => "ERR_HANDLER_NOT_FOUND",
            ExErrorKind::NotApplicable => "ERR_NOT_APPLICABLE",
            ExErrorKind::InvalidHistoryFact => "ERR_INVALID_HISTORY_FACT",
            ExErrorKind::InvalidTimer => "ERR_INVALID_TIMER",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidQuery => "ERR_INVALID_QUERY",
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Concurrency => "ERR_CONCURRENCY",
            ExErrorKind::ContextClosed => "ERR_CONTEXT_CLOSED",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Used at reporting boundaries (logs, CLI, executors). Domain code returns
/// `ProcxError` and converts with `.into()` when it needs the structured form.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    execution_id: Option<String>,
    job_id: Option<String>,
    request_id: Option<RequestId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            execution_id: None,
            job_id: None,
            request_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity ID context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add execution ID context
    pub fn with_execution_id(mut self, id: impl Into<String>) -> Self {
        self.execution_id = Some(id.into());
        self
    }

    /// Add job ID context
    pub fn with_job_id(mut self, id: impl Into<String>) -> Self {
        self.job_id = Some(id.into());
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Copy execution and job identifiers from a diagnostic context
    pub fn with_diagnostics(mut self, diag: &DiagnosticContext) -> Self {
        if let Some(id) = &diag.execution_id {
            self.execution_id = Some(id.clone());
        }
        if let Some(id) = &diag.job_id {
            self.job_id = Some(id.clone());
        }
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn execution_id(&self) -> Option<&str> {
        self.execution_id.as_deref()
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(execution_id) = &self.execution_id {
            write!(f, " (execution_id: {})", execution_id)?;
        }
        if let Some(job_id) = &self.job_id {
            write!(f, " (job_id: {})", job_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Error taxonomy for runtime operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcxError {
    // ===== Lookup =====
    /// A referenced entity is absent
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// A referenced definition (form, process) could not be resolved
    #[error("{message}")]
    ObjectNotFound {
        object_type: String,
        message: String,
    },

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: String, id: String },

    // ===== Process execution =====
    /// An invariant of the calling code was violated; aborts the unit of work
    #[error("{message}")]
    Programmatic { message: String },

    /// A named, modelled fault raised by a node behavior
    #[error("business fault '{error_code}': {message}")]
    BusinessFault { error_code: String, message: String },

    /// A business fault with no matching error handler in the process
    #[error("no error handler found for business fault '{error_code}' raised in execution {execution_id}")]
    UnhandledBusinessFault {
        error_code: String,
        execution_id: String,
    },

    /// Any other failure raised while running node behavior or listeners
    #[error("{message}")]
    Runtime { message: String },

    #[error("error evaluating expression '{expression}': {message}")]
    Expression { expression: String, message: String },

    // ===== Jobs & history =====
    #[error("no job handler registered for type '{handler_type}'")]
    JobHandlerNotFound { handler_type: String },

    /// The history job cannot be applied yet; the job is retried later
    #[error("history fact '{fact_type}' in job {job_id} is not applicable yet")]
    HistoryJobNotApplicable { job_id: String, fact_type: String },

    #[error("invalid history fact: {message}")]
    InvalidHistoryFact { message: String },

    #[error("invalid timer expression '{expression}': {reason}")]
    InvalidTimer { expression: String, reason: String },

    // ===== Persistence =====
    /// The stored revision differs from the one this unit of work loaded
    #[error("{kind} {id} was updated by another transaction (expected revision {revision})")]
    OptimisticLock {
        kind: String,
        id: String,
        revision: i64,
    },

    #[error("invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("persistence error: {message}")]
    Persistence { message: String },

    #[error("migration {migration_id} failed: {reason}")]
    Migration {
        migration_id: String,
        reason: String,
    },

    #[error("serialization error: {message}")]
    Serialization { message: String },

    // ===== Configuration / environment =====
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    // ===== Internal =====
    #[error("command context already closed")]
    ContextClosed,

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ProcxError {
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        ProcxError::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn programmatic(message: impl Into<String>) -> Self {
        ProcxError::Programmatic {
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        ProcxError::Runtime {
            message: message.into(),
        }
    }

    pub fn business_fault(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        ProcxError::BusinessFault {
            error_code: error_code.into(),
            message: message.into(),
        }
    }

    pub fn is_optimistic_lock(&self) -> bool {
        matches!(self, ProcxError::OptimisticLock { .. })
    }

    pub fn kind(&self) -> ExErrorKind {
        match self {
            ProcxError::NotFound { .. } | ProcxError::ObjectNotFound { .. } => {
                ExErrorKind::NotFound
            }
            ProcxError::AlreadyExists { .. } => ExErrorKind::AlreadyExists,
            ProcxError::Programmatic { .. } => ExErrorKind::Programmatic,
            ProcxError::BusinessFault { .. } => ExErrorKind::BusinessFault,
            ProcxError::UnhandledBusinessFault { .. } => ExErrorKind::UnhandledBusinessFault,
            ProcxError::Runtime { .. } => ExErrorKind::Runtime,
            ProcxError::Expression { .. } => ExErrorKind::Expression,
            ProcxError::JobHandlerNotFound { .. } => ExErrorKind::HandlerNotFound,
            ProcxError::HistoryJobNotApplicable { .. } => ExErrorKind::NotApplicable,
            ProcxError::InvalidHistoryFact { .. } => ExErrorKind::InvalidHistoryFact,
            ProcxError::InvalidTimer { .. } => ExErrorKind::InvalidTimer,
            ProcxError::OptimisticLock { .. } => ExErrorKind::Concurrency,
            ProcxError::InvalidQuery { .. } => ExErrorKind::InvalidQuery,
            ProcxError::Persistence { .. } | ProcxError::Migration { .. } => {
                ExErrorKind::Persistence
            }
            ProcxError::Serialization { .. } => ExErrorKind::Serialization,
            ProcxError::InvalidConfig { .. } => ExErrorKind::InvalidConfig,
            ProcxError::Io { .. } => ExErrorKind::Io,
            ProcxError::ContextClosed => ExErrorKind::ContextClosed,
            ProcxError::Internal { .. } => ExErrorKind::Internal,
        }
    }
}

/// Conversion from ProcxError to ExError
impl From<ProcxError> for ExError {
    fn from(err: ProcxError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        let base = ExError::new(kind).with_message(message);
        match err {
            ProcxError::NotFound { id, .. } | ProcxError::AlreadyExists { id, .. } => {
                base.with_entity_id(id)
            }
            ProcxError::OptimisticLock { id, .. } => base.with_entity_id(id).with_op("flush"),
            ProcxError::UnhandledBusinessFault { execution_id, .. } => {
                base.with_execution_id(execution_id)
            }
            ProcxError::HistoryJobNotApplicable { job_id, .. } => {
                base.with_job_id(job_id).with_op("async_history")
            }
            ProcxError::Migration { migration_id, .. } => {
                base.with_entity_id(migration_id).with_op("migration")
            }
            ProcxError::ObjectNotFound { object_type, .. } => base.with_op(format!(
                "resolve_{}",
                object_type.to_lowercase()
            )),
            _ => base,
        }
    }
}

/// Conversion from a borrowed ProcxError, for logging without giving up ownership
impl From<&ProcxError> for ExError {
    fn from(err: &ProcxError) -> Self {
        err.clone().into()
    }
}

impl From<serde_json::Error> for ProcxError {
    fn from(err: serde_json::Error) -> Self {
        ProcxError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ProcxError {
    fn from(err: toml::de::Error) -> Self {
        ProcxError::InvalidConfig {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ProcxError {
    fn from(err: std::io::Error) -> Self {
        ProcxError::Io {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_kind_codes() {
        let cases = [
            (ExErrorKind::Programmatic, "ERR_PROGRAMMATIC"),
            (ExErrorKind::BusinessFault, "ERR_BUSINESS_FAULT"),
            (
                ExErrorKind::UnhandledBusinessFault,
                "ERR_UNHANDLED_BUSINESS_FAULT",
            ),
            (ExErrorKind::Concurrency, "ERR_CONCURRENCY"),
            (ExErrorKind::NotApplicable, "ERR_NOT_APPLICABLE"),
        ];
        for (kind, expected_code) in cases {
            assert_eq!(kind.code(), expected_code, "Wrong code for {:?}", kind);
        }
    }

    #[test]
    fn test_optimistic_lock_maps_to_concurrency() {
        let err = ProcxError::OptimisticLock {
            kind: "job".to_string(),
            id: "j1".to_string(),
            revision: 3,
        };
        assert!(err.is_optimistic_lock());

        let ex: ExError = err.into();
        assert_eq!(ex.kind(), ExErrorKind::Concurrency);
        assert_eq!(ex.entity_id(), Some("j1"));
        assert_eq!(ex.op(), Some("flush"));
    }

    #[test]
    fn test_with_diagnostics_copies_ids() {
        let mut diag = DiagnosticContext::new();
        diag.tag_execution("e1", Some("p1"), None, None);
        diag.tag_job("j9");

        let ex = ExError::new(ExErrorKind::Runtime).with_diagnostics(&diag);
        assert_eq!(ex.execution_id(), Some("e1"));
        assert_eq!(ex.job_id(), Some("j9"));
    }

    #[test]
    fn test_display_includes_code_and_message() {
        let ex: ExError = ProcxError::not_found("execution", "e42").into();
        let text = ex.to_string();
        assert!(text.starts_with("[ERR_NOT_FOUND]"));
        assert!(text.contains("execution not found: e42"));
        assert!(text.contains("(entity_id: e42)"));
    }
}
