use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::events::{EventDispatcher, NoopEventDispatcher};
use crate::form::{ExpressionEvaluator, FormDefinitionResolver, FormInstanceQuery};
use crate::history::TransformerRegistry;
use crate::job::JobHandlerRegistry;
use crate::persistence::Database;
use crate::process::{InMemoryProcessDefinitionRegistry, ProcessDefinitionRegistry};
use std::sync::Arc;

/// Long-lived collaborators shared by every unit of work
///
/// Built once at startup and never mutated afterwards; each
/// `CommandContext` holds an `Arc` to it.
pub struct EngineServices {
    pub config: EngineConfig,
    pub database: Arc<dyn Database>,
    pub event_dispatcher: Arc<dyn EventDispatcher>,
    pub process_definitions: Arc<dyn ProcessDefinitionRegistry>,
    pub job_handlers: Arc<JobHandlerRegistry>,
    pub transformers: Arc<TransformerRegistry>,
    pub clock: Arc<dyn Clock>,
    pub forms: Option<FormServices>,
}

/// Collaborators of the form-filling logic
#[derive(Clone)]
pub struct FormServices {
    pub resolver: Arc<dyn FormDefinitionResolver>,
    pub instances: Arc<dyn FormInstanceQuery>,
    pub expressions: Arc<dyn ExpressionEvaluator>,
}

impl EngineServices {
    pub fn builder(database: Arc<dyn Database>) -> EngineServicesBuilder {
        EngineServicesBuilder {
            config: EngineConfig::default(),
            database,
            event_dispatcher: None,
            process_definitions: None,
            job_handlers: None,
            transformers: None,
            clock: None,
            forms: None,
        }
    }
}

pub struct EngineServicesBuilder {
    config: EngineConfig,
    database: Arc<dyn Database>,
    event_dispatcher: Option<Arc<dyn EventDispatcher>>,
    process_definitions: Option<Arc<dyn ProcessDefinitionRegistry>>,
    job_handlers: Option<Arc<JobHandlerRegistry>>,
    transformers: Option<Arc<TransformerRegistry>>,
    clock: Option<Arc<dyn Clock>>,
    forms: Option<FormServices>,
}

impl EngineServicesBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn event_dispatcher(mut self, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        self.event_dispatcher = Some(dispatcher);
        self
    }

    pub fn process_definitions(mut self, registry: Arc<dyn ProcessDefinitionRegistry>) -> Self {
        self.process_definitions = Some(registry);
        self
    }

    pub fn job_handlers(mut self, registry: JobHandlerRegistry) -> Self {
        self.job_handlers = Some(Arc::new(registry));
        self
    }

    pub fn transformers(mut self, registry: TransformerRegistry) -> Self {
        self.transformers = Some(Arc::new(registry));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn forms(mut self, forms: FormServices) -> Self {
        self.forms = Some(forms);
        self
    }

    /// Unset collaborators fall back to: disabled event dispatcher, empty
    /// definition registry, built-in job handlers and history transformers,
    /// system clock, no form services.
    pub fn build(self) -> Arc<EngineServices> {
        Arc::new(EngineServices {
            config: self.config,
            database: self.database,
            event_dispatcher: self
                .event_dispatcher
                .unwrap_or_else(|| Arc::new(NoopEventDispatcher)),
            process_definitions: self
                .process_definitions
                .unwrap_or_else(|| Arc::new(InMemoryProcessDefinitionRegistry::new())),
            job_handlers: self
                .job_handlers
                .unwrap_or_else(|| Arc::new(JobHandlerRegistry::with_defaults())),
            transformers: self
                .transformers
                .unwrap_or_else(|| Arc::new(TransformerRegistry::with_defaults())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            forms: self.forms,
        })
    }
}
