//! Test orchestration: configure, run phases, stop

use crate::error::{EngineError, Result};
use crate::group::{GroupSettings, SERIALIZED, TEAR_DOWN_ON_SHUTDOWN};
use crate::registry::ThreadRegistry;
use crate::thread::{GroupSetup, VirtualUser};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use volley_control::{Component, GroupKind, NodeId, SubtreeResolver, TestTree};
use volley_core::{
    ExpressionCompiler, FunctionRegistry, Listener, ScriptEngineFactory, SharedProperties,
    ThreadContext, ThreadIdentity, ThreadSignal,
};

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// How long a forced stop waits for each thread
    pub thread_stop_timeout: Duration,
    /// Pause per active thread after interrupting, before waiting
    pub grace_per_thread: Duration,
    /// Exit the process when a forced stop leaves threads behind
    pub exit_on_stop_failure: bool,
    /// Delayed start for groups that do not set it
    pub delayed_start_default: bool,
    /// Overrides the plan's `serialized` flag
    pub serialized_override: Option<bool>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            thread_stop_timeout: Duration::from_millis(5000),
            grace_per_thread: Duration::from_millis(10),
            exit_on_stop_failure: false,
            delayed_start_default: false,
            serialized_override: None,
        }
    }
}

/// What a finished run reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub threads_started: usize,
    /// Whether the run was stopped before the main groups completed
    pub stopped: bool,
}

/// A started group as seen by the stop paths
#[derive(Debug)]
struct ActiveGroup {
    name: String,
    registry: Arc<ThreadRegistry>,
    starter: Arc<ThreadSignal>,
}

#[derive(Debug)]
struct EngineShared {
    settings: EngineSettings,
    running: AtomicBool,
    stopped: AtomicBool,
    groups: Mutex<Vec<Arc<ActiveGroup>>>,
}

impl EngineShared {
    fn stop(&self, now: bool) {
        self.stopped.store(true, Ordering::SeqCst);
        let groups = self.groups.lock().clone();
        for group in &groups {
            if now {
                group.starter.interrupt();
            } else {
                group.starter.stop();
            }
            group.registry.stop_all(now);
        }
    }

    fn stop_now(&self) {
        info!("Stopping test now");
        self.stop(true);

        let groups = self.groups.lock().clone();
        let active: usize = groups.iter().map(|g| g.registry.active_threads()).sum();
        if active == 0 {
            return;
        }
        std::thread::sleep(self.settings.grace_per_thread * active as u32);

        let mut stragglers = 0;
        for group in &groups {
            for (key, name) in group.registry.threads() {
                if !group
                    .registry
                    .wait_for(key, self.settings.thread_stop_timeout)
                {
                    warn!(group = %group.name, "Thread won't exit: {}", name);
                    stragglers += 1;
                }
            }
        }
        if stragglers == 0 {
            info!("All threads stopped");
            return;
        }
        error!("{} thread(s) did not stop", stragglers);
        if self.settings.exit_on_stop_failure {
            exit_process();
        }
    }
}

fn exit_process() -> ! {
    error!("Exiting after failed stop");
    std::process::exit(1)
}

/// Cloneable control surface of a running engine
#[derive(Debug, Clone)]
pub struct EngineHandle {
    shared: Arc<EngineShared>,
}

impl EngineHandle {
    /// Cooperative stop: every thread ends after its current sample
    pub fn ask_threads_to_stop(&self) {
        info!("Asking threads to stop");
        self.shared.stop(false);
    }

    /// Stops the test; with `now`, interrupts blocking waits and waits a
    /// bounded time for each thread from a separate stopper thread
    pub fn stop_test(&self, now: bool) {
        if !now {
            self.ask_threads_to_stop();
            return;
        }
        let shared = self.shared.clone();
        let spawned = std::thread::Builder::new()
            .name("StopTest".to_string())
            .spawn(move || shared.stop_now());
        if let Err(e) = spawned {
            error!("Cannot start stopper thread: {}", e);
            self.shared.stop(true);
        }
    }

    /// Stops the thread called `name`, returning whether it was found
    pub fn stop_thread(&self, name: &str, now: bool) -> bool {
        let groups = self.shared.groups.lock().clone();
        groups.iter().any(|g| g.registry.stop_thread(name, now))
    }

    /// Ends the process immediately
    pub fn exit(&self) -> ! {
        exit_process()
    }

    pub fn active_threads(&self) -> usize {
        self.shared
            .groups
            .lock()
            .iter()
            .map(|g| g.registry.active_threads())
            .sum()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }
}

/// Clears the running state when a run ends, however it ends
struct RunningGuard<'a>(&'a EngineShared);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.groups.lock().clear();
        self.0.running.store(false, Ordering::SeqCst);
    }
}

/// Runs a compiled test plan
pub struct Engine {
    shared: Arc<EngineShared>,
    compiler: ExpressionCompiler,
    properties: SharedProperties,
    scripts: Option<Arc<dyn ScriptEngineFactory>>,
    resolver: Option<Arc<dyn SubtreeResolver>>,
    plan: Option<Arc<TestTree>>,
}

impl Engine {
    pub fn new(functions: Arc<FunctionRegistry>, settings: EngineSettings) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                settings,
                running: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                groups: Mutex::new(Vec::new()),
            }),
            compiler: ExpressionCompiler::new(functions),
            properties: SharedProperties::new(),
            scripts: None,
            resolver: None,
            plan: None,
        }
    }

    pub fn with_properties(mut self, properties: SharedProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Script engine factory for conditions and script functions
    pub fn with_script_engine(mut self, factory: Arc<dyn ScriptEngineFactory>) -> Self {
        self.scripts = Some(factory);
        self
    }

    /// Resolver for include controllers
    pub fn with_resolver(mut self, resolver: Arc<dyn SubtreeResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn properties(&self) -> &SharedProperties {
        &self.properties
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.shared.settings
    }

    /// The configured plan, if any
    pub fn plan(&self) -> Option<&Arc<TestTree>> {
        self.plan.as_ref()
    }

    fn main_context(&self) -> ThreadContext {
        let mut ctx = ThreadContext::new(ThreadIdentity::default())
            .with_properties(self.properties.clone());
        if let Some(scripts) = &self.scripts {
            ctx = ctx.with_script_engine(scripts.create());
        }
        ctx
    }

    /// Resolves includes, drops disabled elements and compiles every property.
    ///
    /// Any expression error makes the plan invalid; all of them are logged.
    pub fn configure(&mut self, mut tree: TestTree) -> Result<()> {
        if self.handle().is_running() {
            return Err(EngineError::AlreadyRunning);
        }
        let mut ctx = self.main_context();
        if let Some(resolver) = &self.resolver {
            tree.resolve_includes(resolver.as_ref(), &self.compiler, &mut ctx)?;
        }
        let removed = tree.remove_disabled();
        if removed > 0 {
            debug!(removed, "Removed disabled elements");
        }

        let errors = tree.compile(&self.compiler);
        if !errors.is_empty() {
            let messages: Vec<String> = errors
                .iter()
                .map(|(element, e)| format!("{}: {}", element, e))
                .collect();
            for message in &messages {
                error!("Invalid test plan element {}", message);
            }
            return Err(EngineError::InvalidPlan(messages));
        }

        info!(
            groups = tree.thread_groups().len(),
            "Test plan configured"
        );
        self.plan = Some(Arc::new(tree));
        Ok(())
    }

    /// Runs the configured plan to completion and blocks until every
    /// thread has finished
    pub fn run(&self) -> Result<RunReport> {
        let tree = self.plan.clone().ok_or(EngineError::NoTestPlan)?;
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.shared);
        self.shared.stopped.store(false, Ordering::SeqCst);

        let mut ctx = self.main_context();
        let plan = tree.element(tree.root()).ok_or(EngineError::NoTestPlan)?;
        let serialized = self
            .shared
            .settings
            .serialized_override
            .unwrap_or_else(|| plan.bool(SERIALIZED, &mut ctx));
        let tear_down_on_shutdown = match plan.property(TEAR_DOWN_ON_SHUTDOWN) {
            Some(_) => plan.bool(TEAR_DOWN_ON_SHUTDOWN, &mut ctx),
            None => true,
        };

        let listeners = test_listeners(&tree);
        for (id, listener) in &listeners {
            if let Some(element) = tree.element(*id) {
                listener
                    .test_started(element)
                    .map_err(|source| EngineError::Listener {
                        name: element.name(),
                        source,
                    })?;
            }
        }
        info!(plan = %plan.name(), serialized, "Test started");

        let groups = tree.thread_groups();
        let of_kind = |kind: GroupKind| -> Vec<NodeId> {
            groups
                .iter()
                .filter(|(_, k)| *k == kind)
                .map(|(id, _)| *id)
                .collect()
        };
        let mut number = 0;
        let mut started = 0;

        let outcome = (|| -> Result<()> {
            started += self.run_phase(&tree, &of_kind(GroupKind::Setup), serialized, &mut number)?;
            if !self.is_stopped() {
                started +=
                    self.run_phase(&tree, &of_kind(GroupKind::Regular), serialized, &mut number)?;
            }
            Ok(())
        })();
        let stopped = self.is_stopped();

        let outcome = outcome.and_then(|()| {
            let teardown = of_kind(GroupKind::Teardown);
            if teardown.is_empty() {
                return Ok(());
            }
            if stopped && !tear_down_on_shutdown {
                info!("Skipping tearDown thread groups after stop");
                return Ok(());
            }
            self.shared.stopped.store(false, Ordering::SeqCst);
            started += self.run_phase(&tree, &teardown, serialized, &mut number)?;
            Ok(())
        });

        for (id, listener) in &listeners {
            if let Some(element) = tree.element(*id) {
                if let Err(e) = listener.test_ended(element) {
                    warn!(listener = %element.name(), "Listener failed at test end: {}", e);
                }
            }
        }
        outcome?;
        info!(threads = started, stopped, "Test ended");
        Ok(RunReport {
            threads_started: started,
            stopped,
        })
    }

    fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    /// Starts the given groups, one at a time when serialized, and waits
    /// for all of them
    fn run_phase(
        &self,
        tree: &Arc<TestTree>,
        groups: &[NodeId],
        serialized: bool,
        number: &mut usize,
    ) -> Result<usize> {
        let mut started = 0;
        let mut running: Vec<Arc<ThreadRegistry>> = Vec::new();
        for &node in groups {
            if self.is_stopped() {
                break;
            }
            *number += 1;
            let registry = match self.start_group(tree, node, *number) {
                Ok((registry, count)) => {
                    started += count;
                    registry
                }
                Err(e) => {
                    self.shared.stop(false);
                    for registry in &running {
                        registry.wait_threads_stopped(None);
                    }
                    return Err(e);
                }
            };
            if serialized {
                registry.wait_threads_stopped(None);
            } else {
                running.push(registry);
            }
        }
        for registry in &running {
            registry.wait_threads_stopped(None);
        }
        self.shared.groups.lock().clear();
        Ok(started)
    }

    fn start_group(
        &self,
        tree: &Arc<TestTree>,
        node: NodeId,
        number: usize,
    ) -> Result<(Arc<ThreadRegistry>, usize)> {
        let element = tree
            .element(node)
            .ok_or(volley_control::ControlError::UnknownNode(node))?;
        let mut ctx = self.main_context();
        let settings =
            GroupSettings::from_element(element, self.shared.settings.delayed_start_default, &mut ctx);

        let registry = Arc::new(ThreadRegistry::new());
        let starter = Arc::new(ThreadSignal::new());
        self.shared.groups.lock().push(Arc::new(ActiveGroup {
            name: settings.name.clone(),
            registry: registry.clone(),
            starter: starter.clone(),
        }));
        // A stop issued before the group was registered above
        if self.is_stopped() {
            starter.stop();
        }

        let now = Instant::now();
        let (start, end) = match settings.scheduler {
            Some((delay, duration)) => {
                let start = now + delay;
                (start, (!duration.is_zero()).then(|| start + duration))
            }
            None => (now, None),
        };
        let count = settings.num_threads;
        info!(
            group = %settings.name,
            threads = count,
            ramp_up_ms = settings.ramp_up.as_millis() as u64,
            delayed_start = settings.delayed_start,
            "Starting thread group"
        );

        let setup = Arc::new(GroupSetup {
            tree: tree.clone(),
            node,
            number,
            settings,
            properties: self.properties.clone(),
            scripts: self.scripts.clone(),
            registry: registry.clone(),
            starter: starter.clone(),
            engine: self.handle(),
            start,
            end,
        });
        registry.expect(count);

        if setup.settings.delayed_start {
            let starter_setup = setup.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("{}-starter", setup.settings.name))
                .spawn(move || start_delayed(&starter_setup));
            if let Err(source) = spawned {
                registry.abandon(count);
                return Err(EngineError::ThreadSpawn {
                    name: format!("{}-starter", setup.settings.name),
                    source,
                });
            }
        } else {
            for index in 0..count {
                if !starter.is_running() {
                    registry.abandon(count - index);
                    break;
                }
                if let Err(e) = VirtualUser::spawn(&setup, index) {
                    registry.abandon(count - index - 1);
                    return Err(e);
                }
            }
        }
        Ok((registry, count))
    }
}

/// Creates each thread of a delayed-start group at its ramp-up offset
fn start_delayed(setup: &Arc<GroupSetup>) {
    let count = setup.settings.num_threads;
    for index in 0..count {
        let at = setup.start + setup.settings.ramp_delay(index);
        if !setup.starter.pause_until(at) {
            setup.registry.abandon(count - index);
            return;
        }
        if let Err(e) = VirtualUser::spawn(setup, index) {
            error!(group = %setup.settings.name, "{}", e);
            setup.registry.abandon(count - index - 1);
            return;
        }
    }
}

/// Every listener of the plan with its node, in plan order
fn test_listeners(tree: &TestTree) -> Vec<(NodeId, Arc<dyn Listener>)> {
    tree.descendants(tree.root())
        .into_iter()
        .filter_map(|id| match tree.node(id).map(|n| &n.component) {
            Some(Component::Listener(listener)) => Some((id, listener.clone())),
            _ => None,
        })
        .collect()
}
