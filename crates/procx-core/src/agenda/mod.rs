//! Agenda: the work-list that drives process execution
//!
//! Operations are taken from the head and may append further operations to
//! the tail. Continuing execution never recurses; stack depth stays constant
//! however long the chain of operations becomes.

mod continue_multi_instance;
mod continue_process;
mod error_propagation;

pub use continue_multi_instance::{continue_multi_instance, plan_multi_instance, NUMBER_OF_INSTANCES};
pub use continue_process::{continue_process, execute_synchronous};
pub use error_propagation::propagate_error;

use crate::context::CommandContext;
use crate::errors::Result;
use std::collections::VecDeque;
use std::fmt;

/// Operation supplied from outside the core
pub trait AgendaOperation: Send {
    fn name(&self) -> &str;

    fn run(self: Box<Self>, ctx: &mut CommandContext) -> Result<OperationOutcome>;
}

pub enum Operation {
    /// Run one instance of a multi-instance node
    ContinueMultiInstance {
        execution_id: String,
        loop_counter: i64,
    },
    /// Execute the behavior of the execution's current node inline
    ContinueProcess { execution_id: String },
    Custom(Box<dyn AgendaOperation>),
}

impl Operation {
    pub fn name(&self) -> &str {
        match self {
            Operation::ContinueMultiInstance { .. } => "continue_multi_instance",
            Operation::ContinueProcess { .. } => "continue_process",
            Operation::Custom(op) => op.name(),
        }
    }

    pub(crate) fn run(self, ctx: &mut CommandContext) -> Result<OperationOutcome> {
        match self {
            Operation::ContinueMultiInstance {
                execution_id,
                loop_counter,
            } => continue_multi_instance(ctx, &execution_id, loop_counter),
            Operation::ContinueProcess { execution_id } => continue_process(ctx, &execution_id),
            Operation::Custom(op) => op.run(ctx),
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::ContinueMultiInstance {
                execution_id,
                loop_counter,
            } => f
                .debug_struct("ContinueMultiInstance")
                .field("execution_id", execution_id)
                .field("loop_counter", loop_counter)
                .finish(),
            Operation::ContinueProcess { execution_id } => f
                .debug_struct("ContinueProcess")
                .field("execution_id", execution_id)
                .finish(),
            Operation::Custom(op) => f.debug_tuple("Custom").field(&op.name()).finish(),
        }
    }
}

/// Terminal state of one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// Fully applied in this unit of work
    Done,
    /// Handed off to a job; completes in a later unit of work
    Deferred { job_id: String },
}

#[derive(Debug, Default)]
pub struct Agenda {
    queue: VecDeque<Operation>,
    completed: Vec<(String, OperationOutcome)>,
}

impl Agenda {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, operation: Operation) {
        self.queue.push_back(operation);
    }

    pub(crate) fn next(&mut self) -> Option<Operation> {
        self.queue.pop_front()
    }

    pub(crate) fn record(&mut self, name: String, outcome: OperationOutcome) {
        self.completed.push((name, outcome));
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Queued operations, head first
    pub fn pending(&self) -> impl Iterator<Item = &Operation> {
        self.queue.iter()
    }

    /// Operations run so far with their outcome, in execution order
    pub fn completed(&self) -> &[(String, OperationOutcome)] {
        &self.completed
    }

    pub(crate) fn clear(&mut self) {
        self.queue.clear();
        self.completed.clear();
    }
}
