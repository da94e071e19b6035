//! Engine events and the dispatcher boundary
//!
//! Events are dispatched synchronously from inside the unit of work that
//! produced them. A failing listener is logged and skipped; the dispatcher
//! never retries and never fails the command.

use crate::cache::EntityKind;
use crate::errors::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    EntityCreated {
        kind: EntityKind,
        id: String,
    },
    EntityDeleted {
        kind: EntityKind,
        id: String,
    },
    ActivityStarted {
        activity_id: String,
        activity_name: Option<String>,
        execution_id: String,
        process_instance_id: String,
        process_definition_id: String,
    },
    JobExecutionSuccess {
        job_id: String,
    },
    JobExecutionFailure {
        job_id: String,
        message: String,
    },
    JobRetriesDecremented {
        job_id: String,
        retries: i32,
    },
    TimerFired {
        job_id: String,
        element_id: Option<String>,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::EntityCreated { .. } => "entity_created",
            EngineEvent::EntityDeleted { .. } => "entity_deleted",
            EngineEvent::ActivityStarted { .. } => "activity_started",
            EngineEvent::JobExecutionSuccess { .. } => "job_execution_success",
            EngineEvent::JobExecutionFailure { .. } => "job_execution_failure",
            EngineEvent::JobRetriesDecremented { .. } => "job_retries_decremented",
            EngineEvent::TimerFired { .. } => "timer_fired",
        }
    }
}

pub trait EventDispatcher: Send + Sync {
    fn is_enabled(&self) -> bool;

    fn dispatch_event(&self, event: &EngineEvent);
}

pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &EngineEvent) -> Result<()>;
}

/// Dispatcher that is always disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventDispatcher;

impl EventDispatcher for NoopEventDispatcher {
    fn is_enabled(&self) -> bool {
        false
    }

    fn dispatch_event(&self, _event: &EngineEvent) {}
}

/// Fan-out to registered listeners; enabled on creation
pub struct ListenerEventDispatcher {
    enabled: AtomicBool,
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl ListenerEventDispatcher {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push(listener);
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

impl Default for ListenerEventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher for ListenerEventDispatcher {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn dispatch_event(&self, event: &EngineEvent) {
        let listeners = match self.listeners.read() {
            Ok(l) => l.clone(),
            Err(_) => return,
        };
        for listener in listeners {
            if let Err(err) = listener.on_event(event) {
                tracing::warn!(event_type = event.name(), error = %err, "event listener failed");
            }
        }
    }
}

/// Listener that records every event, for tests and diagnostics
#[derive(Default)]
pub struct RecordingListener {
    events: RwLock<Vec<EngineEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }
}

impl EventListener for RecordingListener {
    fn on_event(&self, event: &EngineEvent) -> Result<()> {
        if let Ok(mut events) = self.events.write() {
            events.push(event.clone());
        }
        Ok(())
    }
}
