use procx_core::errors::{ProcxError, Result};
use procx_core::job;
use procx_core::persistence::JobQuery;
use procx_core::process::{ActivityBehavior, FlowNode, InMemoryProcessDefinitionRegistry, MultiInstanceCharacteristics, ProcessDefinition};
use procx_core::{Command, CommandContext, CommandOutcome, EngineConfig, Execution, JobKind};
use procx_engine::ProcessEngine;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts invocations; fails every call when `fail` is set
#[allow(dead_code)]
#[derive(Default)]
pub struct CountingBehavior {
    pub calls: AtomicUsize,
    pub fail: bool,
}

#[allow(dead_code)]
impl CountingBehavior {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ActivityBehavior for CountingBehavior {
    fn name(&self) -> &str {
        "counting"
    }

    fn execute(&self, ctx: &mut CommandContext, execution_id: &str) -> Result<()> {
        ctx.require::<Execution>(execution_id)?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProcxError::runtime("service unavailable"));
        }
        Ok(())
    }
}

/// Engine with definition `def:mi` whose node `mi` is an asynchronous,
/// non-exclusive multi-instance node
#[allow(dead_code)]
pub fn engine_with(behavior: Arc<CountingBehavior>, mut config: EngineConfig) -> ProcessEngine {
    config.async_executor.acquire_wait_ms = 10;
    config.async_history_executor.acquire_wait_ms = 10;
    let registry = Arc::new(InMemoryProcessDefinitionRegistry::new());
    registry.deploy(
        ProcessDefinition::new("def:mi", "mi").with_node(
            FlowNode::new("mi", behavior)
                .asynchronous(false)
                .multi_instance(MultiInstanceCharacteristics::default()),
        ),
    );
    ProcessEngine::builder()
        .config(config)
        .process_definitions(registry)
        .build()
        .unwrap()
}

/// Seed a root execution at `mi` and fan it out into `instances` deferred jobs
#[allow(dead_code)]
pub fn fan_out(engine: &ProcessEngine, instances: u32) -> Vec<String> {
    let root = engine
        .command_executor()
        .execute("seed", |ctx| {
            let instance = Execution::new_process_instance(ctx.new_id(), "def:mi").with_activity("mi");
            let id = instance.id.clone();
            ctx.insert(instance)?;
            Ok(id)
        })
        .unwrap();
    match engine
        .apply(Command::StartMultiInstance {
            execution_id: root,
            instances,
        })
        .unwrap()
    {
        CommandOutcome::Executions(ids) => ids,
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[allow(dead_code)]
pub fn count_jobs(engine: &ProcessEngine, kind: JobKind) -> u64 {
    engine
        .command_executor()
        .execute("count_jobs", |ctx| job::count(ctx, &JobQuery::new().kind(kind)))
        .unwrap()
}
