//! Correlation identifiers for commands and the jobs they spawn
//!
//! A command executed by the engine gets a fresh `RequestId`. Jobs picked up by
//! an executor carry the `TraceId` of the acquisition cycle that locked them so
//! every command in one cycle can be grouped in the logs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! correlation_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh, time-ordered identifier (UUIDv7)
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Wrap an identifier received from elsewhere
            pub fn from_string(s: String) -> Self {
                Self(s)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

correlation_id!(
    /// Identifier of one command execution (one unit of work)
    RequestId
);

correlation_id!(
    /// Identifier shared by every command started from the same executor cycle
    TraceId
);

/// Correlation carried by a unit of work
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub trace_id: Option<TraceId>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }

    #[test]
    fn test_display_matches_as_str() {
        let id = TraceId::new();
        assert_eq!(id.to_string(), id.as_str());
    }

    #[test]
    fn test_request_context_trace() {
        let trace = TraceId::from_string("cycle-1".to_string());
        let ctx = RequestContext::new().with_trace_id(trace.clone());
        assert_eq!(ctx.trace_id, Some(trace));
    }

    #[test]
    fn test_serialization_is_transparent_string() {
        let id = RequestId::from_string("r-1".to_string());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"r-1\"");
        let back: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
