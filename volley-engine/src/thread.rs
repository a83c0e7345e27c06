//! Virtual-user threads

use crate::engine::EngineHandle;
use crate::group::{GroupSettings, OnError};
use crate::registry::{ThreadKey, ThreadRegistry};
use crate::transaction::TransactionState;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use volley_control::kind::GENERATE_PARENT_SAMPLE;
use volley_control::{Component, NodeId, Pulled, SamplePackage, TestTree, ThreadTree};
use volley_core::{
    SampleEvent, SampleResult, ScriptEngineFactory, SharedProperties, ThreadContext,
    ThreadIdentity, ThreadSignal,
};

/// Wait before pulling again after an empty pass of an endless main loop
const EMPTY_PASS_PAUSE: Duration = Duration::from_millis(10);

/// Everything the threads of one group share
pub(crate) struct GroupSetup {
    pub tree: Arc<TestTree>,
    pub node: NodeId,
    pub number: usize,
    pub settings: GroupSettings,
    pub properties: SharedProperties,
    pub scripts: Option<Arc<dyn ScriptEngineFactory>>,
    pub registry: Arc<ThreadRegistry>,
    /// Stopped together with the group; also ends a delayed-start starter
    pub starter: Arc<ThreadSignal>,
    pub engine: EngineHandle,
    /// When the first thread may start
    pub start: Instant,
    /// Scheduler end, if any
    pub end: Option<Instant>,
}

/// Removes the thread from its registry however the thread ends
struct FinishGuard<'a> {
    registry: &'a ThreadRegistry,
    key: ThreadKey,
    name: &'a str,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!(thread = %self.name, "Thread panicked");
        }
        self.registry.finished(self.key);
        debug!(thread = %self.name, "Thread finished");
    }
}

/// One simulated user: a thread walking its own copy of the group's tree
pub(crate) struct VirtualUser {
    setup: Arc<GroupSetup>,
    thread_num: usize,
    name: String,
    signal: Arc<ThreadSignal>,
    start_at: Instant,
    transactions: HashMap<NodeId, TransactionState>,
}

impl VirtualUser {
    /// Registers thread `index` (0-based) of the group and starts it
    pub fn spawn(setup: &Arc<GroupSetup>, index: usize) -> crate::Result<()> {
        let thread_num = index + 1;
        let name = format!("{} {}-{}", setup.settings.name, setup.number, thread_num);
        let signal = Arc::new(ThreadSignal::new());
        setup.registry.register(thread_num, &name, signal.clone());
        // A stop may have happened between the caller's check and registration
        if !setup.starter.is_running() {
            signal.stop();
        }

        let user = VirtualUser {
            setup: setup.clone(),
            thread_num,
            name: name.clone(),
            signal,
            start_at: setup.start + setup.settings.ramp_delay(index),
            transactions: HashMap::new(),
        };
        std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || user.run())
            .map(|_| ())
            .map_err(|source| {
                setup.registry.finished(thread_num);
                crate::EngineError::ThreadSpawn { name, source }
            })
    }

    fn run(mut self) {
        let setup = self.setup.clone();
        let name = self.name.clone();
        let _guard = FinishGuard {
            registry: &setup.registry,
            key: self.thread_num,
            name: &name,
        };

        let mut ctx = ThreadContext::new(ThreadIdentity {
            thread_num: self.thread_num,
            thread_name: self.name.clone(),
            group_name: setup.settings.name.clone(),
        })
        .with_properties(setup.properties.clone())
        .with_signal(self.signal.clone());
        if let Some(scripts) = &setup.scripts {
            ctx = ctx.with_script_engine(scripts.create());
        }

        let mut tree = match ThreadTree::materialize(setup.tree.clone(), setup.node) {
            Ok(tree) => tree,
            Err(e) => {
                error!(thread = %self.name, "Cannot build thread tree: {}", e);
                return;
            }
        };

        if !self.signal.pause_until(self.start_at) {
            tree.end_run();
            return;
        }
        debug!(thread = %self.name, "Thread started");

        ctx.variables.set_last_sample_ok(true);
        self.configure(&tree, &mut ctx);
        tree.initialize();

        while ctx.is_running() {
            if setup.end.is_some_and(|end| Instant::now() >= end) {
                debug!(thread = %self.name, "Scheduler end reached");
                break;
            }
            let Some(pulled) = tree.next(&mut ctx) else {
                if tree.is_done() || !ctx.is_running() {
                    break;
                }
                if !tree.has_samplers() {
                    warn!(thread = %self.name, "Thread group has no sampler, stopping thread");
                    break;
                }
                // An endless main loop came back empty this pass
                ctx.signal().pause(EMPTY_PASS_PAUSE);
                continue;
            };
            if let Some(iteration) = tree.take_iteration_start() {
                self.notify_iteration(&tree, iteration);
            }
            match pulled {
                Pulled::Sampler(id) => self.process_sampler(&mut tree, id, &mut ctx),
                Pulled::TransactionEnd(id) => self.end_transaction(&tree, id, &mut ctx),
            }
        }
        tree.end_run();
    }

    fn configure(&self, tree: &ThreadTree, ctx: &mut ThreadContext) {
        for &id in tree.configs() {
            if let (Some(Component::Config(config)), Some(element)) =
                (tree.component(id), tree.element(id))
            {
                config.configure_thread(element, ctx);
            }
        }
    }

    fn notify_iteration(&self, tree: &ThreadTree, iteration: u64) {
        for &id in tree.listeners() {
            if let (Some(Component::Listener(listener)), Some(element)) =
                (tree.component(id), tree.element(id))
            {
                listener.iteration_started(element, &self.name, iteration);
            }
        }
    }

    fn process_sampler(&mut self, tree: &mut ThreadTree, id: NodeId, ctx: &mut ThreadContext) {
        let success = match self.sample(tree, id, ctx) {
            Some(success) => success,
            None => return,
        };
        if success {
            return;
        }
        match self.setup.settings.on_error {
            OnError::Continue => {}
            OnError::StartNextLoop => {
                for tx in tree.start_next_thread_loop(id) {
                    self.end_transaction(tree, tx, ctx);
                }
            }
            OnError::StopThread => {
                info!(thread = %self.name, "Stopping thread after a failed sample");
                ctx.signal().stop();
            }
            OnError::StopTest => {
                info!(thread = %self.name, "Stopping test after a failed sample");
                self.setup.engine.stop_test(false);
            }
            OnError::StopTestNow => {
                info!(thread = %self.name, "Stopping test now after a failed sample");
                self.setup.engine.stop_test(true);
            }
        }
    }

    /// Runs one sampler with everything in its scope; `None` if it was skipped
    fn sample(&mut self, tree: &ThreadTree, id: NodeId, ctx: &mut ThreadContext) -> Option<bool> {
        let Some(Component::Sampler(sampler)) = tree.component(id) else {
            return None;
        };
        let element = tree.element(id)?;
        let package = tree.package(id)?;
        let label = element.label(ctx);
        ctx.set_current_sampler(Some(label.clone()));

        let mut delay = Duration::ZERO;
        for &timer_id in &package.timers {
            if let (Some(Component::Timer(timer)), Some(timer_element)) =
                (tree.component(timer_id), tree.element(timer_id))
            {
                delay += timer.delay(timer_element, ctx);
            }
        }
        let mut idle = Duration::ZERO;
        if !delay.is_zero() {
            let paused = Instant::now();
            ctx.signal().pause(delay);
            idle = paused.elapsed();
        }
        if !ctx.is_running() {
            ctx.set_current_sampler(None);
            return None;
        }

        let mut result = sampler.sample(element, ctx);
        if result.label.is_empty() {
            result.label = label;
        }
        result.thread_name = self.name.clone();
        result.idle_time += idle;
        ctx.variables.set_last_sample_ok(result.success);
        ctx.set_previous_result(result.clone());

        for &pp in &package.post_processors {
            if let (Some(Component::PostProcessor(processor)), Some(pp_element)) =
                (tree.component(pp), tree.element(pp))
            {
                processor.process(pp_element, &result, ctx);
            }
        }
        for &a in &package.assertions {
            if let (Some(Component::Assertion(assertion)), Some(a_element)) =
                (tree.component(a), tree.element(a))
            {
                let outcome = assertion.check(a_element, &result, ctx);
                if outcome.failure {
                    result.add_assertion_failure(format!("{}: {}", outcome.name, outcome.message));
                }
            }
        }
        let success = result.success;
        if !success {
            ctx.variables.set_last_sample_ok(false);
            ctx.set_previous_result(result.clone());
        }
        ctx.set_current_sampler(None);

        self.deliver(tree, package, result, ctx);
        Some(success)
    }

    /// Builds and delivers the parent result of a finished transaction pass
    fn end_transaction(&mut self, tree: &ThreadTree, id: NodeId, ctx: &mut ThreadContext) {
        let Some(element) = tree.element(id) else {
            return;
        };
        let state = self
            .transactions
            .remove(&id)
            .unwrap_or_else(|| TransactionState::new(tree.transaction_started(id)));
        let result = state.into_result(element, &self.name, ctx);
        debug!(
            thread = %self.name,
            transaction = %result.label,
            success = result.success,
            "Transaction finished"
        );
        if let Some(package) = tree.package(id) {
            self.deliver(tree, package, result, ctx);
        }
    }

    /// Records a result in its innermost transaction and notifies listeners,
    /// unless the transaction reports it as a sub-result instead
    fn deliver(
        &mut self,
        tree: &ThreadTree,
        package: &SamplePackage,
        result: SampleResult,
        ctx: &mut ThreadContext,
    ) {
        for &tx in &package.transactions {
            self.transactions
                .entry(tx)
                .or_insert_with(|| TransactionState::new(tree.transaction_started(tx)));
        }
        let parent = package.transactions.last().copied();
        let as_sub_result = parent.is_some_and(|tx| {
            tree.element(tx)
                .is_some_and(|el| el.bool(GENERATE_PARENT_SAMPLE, ctx))
        });

        if !as_sub_result {
            let event = SampleEvent {
                result: &result,
                thread_group: &self.setup.settings.name,
                thread_name: &self.name,
            };
            for &id in &package.listeners {
                if let (Some(Component::Listener(listener)), Some(element)) =
                    (tree.component(id), tree.element(id))
                {
                    listener.sample_occurred(element, &event);
                }
            }
        }
        if let Some(state) = parent.and_then(|tx| self.transactions.get_mut(&tx)) {
            state.record(result, as_sub_result);
        }
    }
}
