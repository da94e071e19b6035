//! Process model boundary
//!
//! Parsing and deployment of process definitions happen elsewhere; the core
//! only sees already-built definitions through `ProcessDefinitionRegistry`.
//! Node semantics are supplied as `ActivityBehavior` implementations.

use crate::context::CommandContext;
use crate::errors::{ProcxError, Result};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};

/// Executes the semantics of one flow node for one execution
///
/// A behavior that raises `ProcxError::BusinessFault` hands control to the
/// process's error handlers; any other error aborts the unit of work.
pub trait ActivityBehavior: Send + Sync {
    /// Short type name used in logs and error messages
    fn name(&self) -> &str;

    fn execute(&self, ctx: &mut CommandContext, execution_id: &str) -> Result<()>;
}

/// Callback run when an execution enters a node
pub trait ExecutionListener: Send + Sync {
    fn notify(&self, ctx: &mut CommandContext, execution_id: &str) -> Result<()>;
}

/// Multi-instance marker of a flow node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiInstanceCharacteristics {
    /// Local variable holding the index of the current instance
    pub element_index_variable: String,
}

impl Default for MultiInstanceCharacteristics {
    fn default() -> Self {
        Self {
            element_index_variable: "loopCounter".to_string(),
        }
    }
}

pub struct FlowNode {
    pub id: String,
    pub name: Option<String>,
    /// Continue in a separate job instead of inline
    pub asynchronous: bool,
    /// Serialize jobs of this node with other exclusive jobs of the instance
    pub exclusive: bool,
    pub behavior: Arc<dyn ActivityBehavior>,
    pub multi_instance: Option<MultiInstanceCharacteristics>,
    pub start_listeners: Vec<Arc<dyn ExecutionListener>>,
}

impl FlowNode {
    pub fn new(id: impl Into<String>, behavior: Arc<dyn ActivityBehavior>) -> Self {
        Self {
            id: id.into(),
            name: None,
            asynchronous: false,
            exclusive: true,
            behavior,
            multi_instance: None,
            start_listeners: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn asynchronous(mut self, exclusive: bool) -> Self {
        self.asynchronous = true;
        self.exclusive = exclusive;
        self
    }

    pub fn multi_instance(mut self, characteristics: MultiInstanceCharacteristics) -> Self {
        self.multi_instance = Some(characteristics);
        self
    }

    pub fn with_start_listener(mut self, listener: Arc<dyn ExecutionListener>) -> Self {
        self.start_listeners.push(listener);
        self
    }
}

impl fmt::Debug for FlowNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("asynchronous", &self.asynchronous)
            .field("exclusive", &self.exclusive)
            .field("behavior", &self.behavior.name())
            .field("multi_instance", &self.multi_instance)
            .field("start_listeners", &self.start_listeners.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceFlow {
    pub id: String,
    pub source_ref: String,
    pub target_ref: String,
}

#[derive(Debug, Clone)]
pub enum FlowElement {
    FlowNode(Arc<FlowNode>),
    SequenceFlow(SequenceFlow),
}

impl FlowElement {
    pub fn id(&self) -> &str {
        match self {
            FlowElement::FlowNode(n) => &n.id,
            FlowElement::SequenceFlow(s) => &s.id,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FlowElement::FlowNode(_) => "flow node",
            FlowElement::SequenceFlow(_) => "sequence flow",
        }
    }
}

/// Catch point for business faults
///
/// `attached_to_activity` set means a boundary handler on that activity;
/// unset means a process-level handler. `error_code` unset catches any code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEventHandler {
    pub id: String,
    pub error_code: Option<String>,
    pub attached_to_activity: Option<String>,
    /// Activity where execution continues once the fault is caught
    pub target_activity_id: String,
}

impl ErrorEventHandler {
    pub fn catches(&self, error_code: &str) -> bool {
        self.error_code.as_deref().map_or(true, |c| c == error_code)
    }
}

#[derive(Debug, Clone)]
pub struct ProcessDefinition {
    pub id: String,
    pub key: String,
    pub tenant_id: Option<String>,
    pub deployment_id: Option<String>,
    elements: BTreeMap<String, FlowElement>,
    error_handlers: Vec<ErrorEventHandler>,
}

impl ProcessDefinition {
    pub fn new(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            tenant_id: None,
            deployment_id: None,
            elements: BTreeMap::new(),
            error_handlers: Vec::new(),
        }
    }

    pub fn with_node(mut self, node: FlowNode) -> Self {
        self.elements
            .insert(node.id.clone(), FlowElement::FlowNode(Arc::new(node)));
        self
    }

    pub fn with_sequence_flow(mut self, flow: SequenceFlow) -> Self {
        self.elements
            .insert(flow.id.clone(), FlowElement::SequenceFlow(flow));
        self
    }

    pub fn with_error_handler(mut self, handler: ErrorEventHandler) -> Self {
        self.error_handlers.push(handler);
        self
    }

    pub fn with_deployment(mut self, deployment_id: impl Into<String>) -> Self {
        self.deployment_id = Some(deployment_id.into());
        self
    }

    pub fn element(&self, id: &str) -> Option<&FlowElement> {
        self.elements.get(id)
    }

    pub fn flow_node(&self, id: &str) -> Option<&Arc<FlowNode>> {
        match self.elements.get(id) {
            Some(FlowElement::FlowNode(n)) => Some(n),
            _ => None,
        }
    }

    /// Boundary handlers attached to `activity_id` that catch `error_code`
    pub fn boundary_handlers<'a>(
        &'a self,
        activity_id: &'a str,
        error_code: &'a str,
    ) -> impl Iterator<Item = &'a ErrorEventHandler> + 'a {
        self.error_handlers.iter().filter(move |h| {
            h.attached_to_activity.as_deref() == Some(activity_id) && h.catches(error_code)
        })
    }

    /// Process-level handlers that catch `error_code`
    pub fn process_handlers<'a>(
        &'a self,
        error_code: &'a str,
    ) -> impl Iterator<Item = &'a ErrorEventHandler> + 'a {
        self.error_handlers
            .iter()
            .filter(move |h| h.attached_to_activity.is_none() && h.catches(error_code))
    }
}

pub trait ProcessDefinitionRegistry: Send + Sync {
    fn find_by_id(&self, id: &str) -> Option<Arc<ProcessDefinition>>;
}

#[derive(Default)]
pub struct InMemoryProcessDefinitionRegistry {
    definitions: RwLock<HashMap<String, Arc<ProcessDefinition>>>,
}

impl InMemoryProcessDefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deploy(&self, definition: ProcessDefinition) -> Arc<ProcessDefinition> {
        let definition = Arc::new(definition);
        if let Ok(mut map) = self.definitions.write() {
            map.insert(definition.id.clone(), Arc::clone(&definition));
        }
        definition
    }
}

impl ProcessDefinitionRegistry for InMemoryProcessDefinitionRegistry {
    fn find_by_id(&self, id: &str) -> Option<Arc<ProcessDefinition>> {
        self.definitions.read().ok()?.get(id).cloned()
    }
}

/// Look up a definition or fail with `NotFound`
pub fn require_definition(
    registry: &dyn ProcessDefinitionRegistry,
    id: &str,
) -> Result<Arc<ProcessDefinition>> {
    registry
        .find_by_id(id)
        .ok_or_else(|| ProcxError::not_found("process_definition", id))
}
