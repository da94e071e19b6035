use chrono::{DateTime, TimeZone, Utc};
use procx_core::clock::FixedClock;
use procx_core::context::EngineServices;
use procx_core::errors::{ProcxError, Result};
use procx_core::events::{ListenerEventDispatcher, RecordingListener};
use procx_core::process::{
    ActivityBehavior, FlowNode, InMemoryProcessDefinitionRegistry, MultiInstanceCharacteristics, ProcessDefinition,
};
use procx_core::{CommandContext, CommandExecutor, EngineConfig, Execution, MemoryDatabase};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Everything a test needs to drive units of work against an in-memory store
#[allow(dead_code)]
pub struct Harness {
    pub db: Arc<MemoryDatabase>,
    pub services: Arc<EngineServices>,
    pub executor: CommandExecutor,
    pub registry: Arc<InMemoryProcessDefinitionRegistry>,
    pub clock: Arc<FixedClock>,
    pub events: Arc<RecordingListener>,
}

#[allow(dead_code)]
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

#[allow(dead_code)]
pub fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

#[allow(dead_code)]
pub fn harness_with(config: EngineConfig) -> Harness {
    let db = Arc::new(MemoryDatabase::new());
    let registry = Arc::new(InMemoryProcessDefinitionRegistry::new());
    let clock = Arc::new(FixedClock::new(t0()));
    let events = Arc::new(RecordingListener::new());
    let dispatcher = Arc::new(ListenerEventDispatcher::new());
    dispatcher.add_listener(events.clone());

    let services = EngineServices::builder(db.clone())
        .config(config)
        .process_definitions(registry.clone())
        .clock(clock.clone())
        .event_dispatcher(dispatcher)
        .build();
    Harness {
        executor: CommandExecutor::new(services.clone()),
        db,
        services,
        registry,
        clock,
        events,
    }
}

impl Harness {
    /// Run `body` in its own committed unit of work
    #[allow(dead_code)]
    pub fn run<T>(&self, body: impl FnOnce(&mut CommandContext) -> Result<T>) -> Result<T> {
        self.executor.execute("test_unit_of_work", body)
    }

    /// Persist a process instance at `activity_id` and return its id
    #[allow(dead_code)]
    pub fn seed_instance(&self, definition_id: &str, activity_id: &str) -> String {
        self.run(|ctx| {
            let instance = Execution::new_process_instance(ctx.new_id(), definition_id).with_activity(activity_id);
            let id = instance.id.clone();
            ctx.insert(instance)?;
            Ok(id)
        })
        .unwrap()
    }

    /// Persist a child of `parent_id` at `activity_id` and return its id
    #[allow(dead_code)]
    pub fn seed_child(&self, parent_id: &str, activity_id: &str) -> String {
        self.run(|ctx| {
            let parent = ctx.require::<Execution>(parent_id)?.clone();
            let child = Execution::new_child(ctx.new_id(), &parent).with_activity(activity_id);
            let id = child.id.clone();
            ctx.insert(child)?;
            Ok(id)
        })
        .unwrap()
    }

    #[allow(dead_code)]
    pub fn execution(&self, id: &str) -> Option<Execution> {
        self.run(|ctx| Ok(ctx.find_by_id::<Execution>(id)?.cloned())).unwrap()
    }
}

/// Records each invocation with the execution's loop counter
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingBehavior {
    pub calls: Mutex<Vec<(String, Option<Value>)>>,
}

#[allow(dead_code)]
impl RecordingBehavior {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<(String, Option<Value>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ActivityBehavior for RecordingBehavior {
    fn name(&self) -> &str {
        "recording"
    }

    fn execute(&self, ctx: &mut CommandContext, execution_id: &str) -> Result<()> {
        let counter = ctx
            .require::<Execution>(execution_id)?
            .get_variable_local("loopCounter")
            .cloned();
        self.calls.lock().unwrap().push((execution_id.to_string(), counter));
        Ok(())
    }
}

/// Always fails with the configured error
#[allow(dead_code)]
pub struct FailingBehavior(pub ProcxError);

impl ActivityBehavior for FailingBehavior {
    fn name(&self) -> &str {
        "failing"
    }

    fn execute(&self, _ctx: &mut CommandContext, _execution_id: &str) -> Result<()> {
        Err(self.0.clone())
    }
}

/// Definition `def:mi` with multi-instance node `mi` and plain node `plain`
#[allow(dead_code)]
pub fn deploy_multi_instance(h: &Harness, behavior: Arc<RecordingBehavior>, asynchronous: bool) {
    let mut mi = FlowNode::new("mi", behavior.clone()).multi_instance(MultiInstanceCharacteristics::default());
    if asynchronous {
        mi = mi.asynchronous(true);
    }
    h.registry.deploy(
        ProcessDefinition::new("def:mi", "mi")
            .with_node(mi)
            .with_node(FlowNode::new("plain", behavior)),
    );
}
