//! Process engine assembly

use crate::executor::{AsyncJobExecutor, ExecutorHandle};
use procx_core::clock::Clock;
use procx_core::context::{EngineServices, FormServices};
use procx_core::events::EventDispatcher;
use procx_core::job::JobHandlerRegistry;
use procx_core::logging_facility;
use procx_core::process::ProcessDefinitionRegistry;
use procx_core::{
    Command, CommandExecutor, CommandOutcome, Database, EngineConfig, JobKind, MemoryDatabase, ProcxError, Result,
};
use procx_store::SqliteDatabase;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// A configured engine: services plus the executor that runs commands
#[derive(Clone)]
pub struct ProcessEngine {
    executor: CommandExecutor,
}

impl ProcessEngine {
    pub fn builder() -> ProcessEngineBuilder {
        ProcessEngineBuilder::default()
    }

    pub fn services(&self) -> &Arc<EngineServices> {
        self.executor.services()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.services().config
    }

    pub fn command_executor(&self) -> &CommandExecutor {
        &self.executor
    }

    pub fn apply(&self, command: Command) -> Result<CommandOutcome> {
        self.executor.apply(command)
    }

    /// Start an instance of `process_definition_id` at `start_activity_id`
    ///
    /// Returns the new process instance id.
    pub fn start_process_instance(
        &self,
        process_definition_id: &str,
        start_activity_id: &str,
        variables: Map<String, Value>,
    ) -> Result<String> {
        let outcome = self.apply(Command::StartProcessInstance {
            process_definition_id: process_definition_id.to_string(),
            start_activity_id: start_activity_id.to_string(),
            tenant_id: None,
            variables,
        })?;
        match outcome {
            CommandOutcome::ProcessInstance { id } => Ok(id),
            other => Err(ProcxError::Internal {
                message: format!("unexpected outcome of start_process_instance: {:?}", other),
            }),
        }
    }

    /// Executor for jobs of `kind`, configured from the matching section
    pub fn job_executor(&self, kind: JobKind) -> AsyncJobExecutor {
        let config = match kind {
            JobKind::History => self.config().async_history_executor.clone(),
            _ => self.config().async_executor.clone(),
        };
        AsyncJobExecutor::new(self.executor.clone(), kind, config)
    }

    /// Spawn the async and async-history executors that are activated in
    /// configuration
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_executors(&self) -> ExecutorHandle {
        let mut handle = ExecutorHandle::new();
        if self.config().async_executor.activate {
            self.job_executor(JobKind::Async).spawn_into(&mut handle);
        }
        if self.config().async_history_enabled && self.config().async_history_executor.activate {
            self.job_executor(JobKind::History).spawn_into(&mut handle);
        }
        handle
    }
}

#[derive(Default)]
pub struct ProcessEngineBuilder {
    config: Option<EngineConfig>,
    database: Option<Arc<dyn Database>>,
    process_definitions: Option<Arc<dyn ProcessDefinitionRegistry>>,
    event_dispatcher: Option<Arc<dyn EventDispatcher>>,
    job_handlers: Option<JobHandlerRegistry>,
    clock: Option<Arc<dyn Clock>>,
    forms: Option<FormServices>,
    init_logging: bool,
}

impl ProcessEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load configuration from a TOML file
    pub fn config_file(self, path: impl AsRef<Path>) -> Result<Self> {
        Ok(self.config(EngineConfig::from_file(path)?))
    }

    pub fn database(mut self, database: Arc<dyn Database>) -> Self {
        self.database = Some(database);
        self
    }

    /// Use (and migrate) the SQLite database at `path`
    pub fn sqlite(self, path: impl AsRef<Path>) -> Result<Self> {
        let db = SqliteDatabase::open(path)?;
        Ok(self.database(Arc::new(db)))
    }

    pub fn process_definitions(mut self, registry: Arc<dyn ProcessDefinitionRegistry>) -> Self {
        self.process_definitions = Some(registry);
        self
    }

    pub fn event_dispatcher(mut self, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        self.event_dispatcher = Some(dispatcher);
        self
    }

    pub fn job_handlers(mut self, registry: JobHandlerRegistry) -> Self {
        self.job_handlers = Some(registry);
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

    /// Initialize the logging facility with the configured profile on build
    pub fn with_logging(mut self) -> Self {
        self.init_logging = true;
        self
    }

    /// Without a database, an in-memory store is used
    pub fn build(self) -> Result<ProcessEngine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        if self.init_logging {
            logging_facility::init(config.logging_profile);
        }

        let database = self
            .database
            .unwrap_or_else(|| Arc::new(MemoryDatabase::new()));
        let mut services = EngineServices::builder(database).config(config);
        if let Some(registry) = self.process_definitions {
            services = services.process_definitions(registry);
        }
        if let Some(dispatcher) = self.event_dispatcher {
            services = services.event_dispatcher(dispatcher);
        }
        if let Some(handlers) = self.job_handlers {
            services = services.job_handlers(handlers);
        }
        if let Some(clock) = self.clock {
            services = services.clock(clock);
        }
        if let Some(forms) = self.forms {
            services = services.forms(forms);
        }
        Ok(ProcessEngine {
            executor: CommandExecutor::new(services.build()),
        })
    }
}
