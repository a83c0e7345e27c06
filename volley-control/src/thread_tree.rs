//! Per-thread materialized tree and the controller walker
//!
//! A [`ThreadTree`] holds one thread's copy of a thread group: owned copies
//! of clonable elements, the iteration state of every controller and the
//! sample package of every sampler. [`ThreadTree::next`] walks it from the
//! root with an explicit frame stack and returns the next item to process.

use crate::error::{ControlError, Result};
use crate::kind::{
    ControllerKind, CONDITION, CONTINUE_FOREVER, END_INDEX, EVALUATE_ALL, INDEX_SUFFIX,
    INPUT_PREFIX, LOOPS, OUTPUT_VAR, SECONDS, SEED, SELECTION, START_INDEX, USE_EXPRESSION,
    USE_SEPARATOR, WEIGHTS,
};
use crate::package::SamplePackage;
use crate::state::{Behavior, ControllerState};
use crate::tree::{Component, NodeId, TestTree};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use volley_core::{TestElement, ThreadContext};

/// One item produced by a walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pulled {
    /// A sampler to run
    Sampler(NodeId),
    /// A transaction controller finished its pass
    TransactionEnd(NodeId),
}

/// Outcome of one entry into a controller
enum Step {
    Yield(Pulled),
    Descend(NodeId),
    /// Nothing more from this controller for the current outer pass
    Null,
    /// Enter the same controller again
    Again,
}

/// Outcome of a controller's entry check
enum Entry {
    Proceed,
    Return(Step),
    /// Start the next pass, then report nothing
    EndPass,
    /// Initialize sub-controllers, start the next pass, report nothing
    Skip,
}

/// A thread's own copy of a thread group
#[derive(Debug)]
pub struct ThreadTree {
    template: Arc<TestTree>,
    root: NodeId,
    owned: Vec<Option<TestElement>>,
    states: Vec<Option<ControllerState>>,
    packages: HashMap<NodeId, SamplePackage>,
    listeners: Vec<NodeId>,
    configs: Vec<NodeId>,
    has_samplers: bool,
    iteration_started: Option<u64>,
}

fn element_in<'a>(
    owned: &'a [Option<TestElement>],
    template: &'a TestTree,
    id: NodeId,
) -> &'a TestElement {
    owned
        .get(id.0)
        .and_then(Option::as_ref)
        .unwrap_or(&template.get(id).element)
}

fn is_sampler(template: &TestTree, id: NodeId) -> bool {
    matches!(template.get(id).component, Component::Sampler(_))
}

impl ThreadTree {
    /// Materializes the thread group `group` of `template` for one thread
    pub fn materialize(template: Arc<TestTree>, group: NodeId) -> Result<Self> {
        let group_node = template.node(group).ok_or(ControlError::UnknownNode(group))?;
        if !matches!(group_node.component, Component::ThreadGroup(_)) {
            return Err(ControlError::NotAThreadGroup(group));
        }

        let size = template.capacity();
        let mut owned: Vec<Option<TestElement>> = vec![None; size];
        let mut states: Vec<Option<ControllerState>> = vec![None; size];

        // Plan-level elements apply to every thread group
        let mut scope: Vec<NodeId> = Vec::new();
        for &child in template.children(template.root()) {
            let node = template.get(child);
            if !matches!(node.component, Component::ThreadGroup(_)) && !node.component.is_walked() {
                scope.extend(template.descendants(child));
            }
        }
        scope.extend(template.descendants(group));

        let mut listeners = Vec::new();
        let mut configs = Vec::new();
        for &id in &scope {
            let node = template.get(id);
            if node.clonable {
                let mut copy = node.element.clone();
                copy.begin_run();
                owned[id.0] = Some(copy);
            }
            let walked: Vec<NodeId> = node
                .children()
                .iter()
                .copied()
                .filter(|&c| template.get(c).component.is_walked())
                .collect();
            match &node.component {
                Component::ThreadGroup(_) if id == group => {
                    states[id.0] = Some(ControllerState::new(Behavior::main_loop(), walked));
                }
                Component::Controller(kind) => {
                    let mut behavior = Behavior::for_kind(*kind);
                    let mut ctx = ThreadContext::default();
                    match &mut behavior {
                        Behavior::Loop {
                            continue_forever, ..
                        } => {
                            *continue_forever = match node.element.property(CONTINUE_FOREVER) {
                                Some(_) => node.element.bool(CONTINUE_FOREVER, &mut ctx),
                                None => true,
                            };
                        }
                        Behavior::Weighted { rng, .. } => {
                            let seed = node.element.int_or(SEED, 0, &mut ctx);
                            if seed != 0 {
                                *rng = StdRng::seed_from_u64(seed as u64);
                            }
                        }
                        _ => {}
                    }
                    states[id.0] = Some(ControllerState::new(behavior, walked));
                }
                Component::Listener(_) => listeners.push(id),
                Component::Config(_) => configs.push(id),
                _ => {}
            }
        }

        let mut packages = HashMap::new();
        for &id in &scope {
            let component = &template.get(id).component;
            let is_transaction = matches!(
                component,
                Component::Controller(ControllerKind::Transaction)
            );
            if matches!(component, Component::Sampler(_)) || is_transaction {
                packages.insert(id, SamplePackage::collect(&template, id));
            }
        }

        let has_samplers = template
            .descendants(group)
            .into_iter()
            .any(|id| is_sampler(&template, id));
        debug!(
            group = %template.get(group).element.name(),
            nodes = scope.len(),
            samplers = packages.len(),
            "Materialized thread tree"
        );

        Ok(Self {
            template,
            root: group,
            owned,
            states,
            packages,
            listeners,
            configs,
            has_samplers,
            iteration_started: None,
        })
    }

    pub fn template(&self) -> &Arc<TestTree> {
        &self.template
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The thread's element for `id`: its own copy when clonable
    pub fn element(&self, id: NodeId) -> Option<&TestElement> {
        self.template.node(id)?;
        Some(element_in(&self.owned, &self.template, id))
    }

    /// Mutable access to an owned copy; shared elements are read-only
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut TestElement> {
        self.owned.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn component(&self, id: NodeId) -> Option<&Component> {
        self.template.node(id).map(|n| &n.component)
    }

    pub fn package(&self, id: NodeId) -> Option<&SamplePackage> {
        self.packages.get(&id)
    }

    /// Every listener visible to this thread, plan-level first
    pub fn listeners(&self) -> &[NodeId] {
        &self.listeners
    }

    /// Every config element visible to this thread, plan-level first
    pub fn configs(&self) -> &[NodeId] {
        &self.configs
    }

    /// Whether the thread group holds any sampler at all
    pub fn has_samplers(&self) -> bool {
        self.has_samplers
    }

    /// Whether the main loop finished
    pub fn is_done(&self) -> bool {
        self.state(self.root).is_none_or(|s| s.done)
    }

    /// Iteration number of a main-loop pass that started since the last call
    pub fn take_iteration_start(&mut self) -> Option<u64> {
        self.iteration_started.take()
    }

    /// When the current pass of a transaction controller started
    pub fn transaction_started(&self, id: NodeId) -> Option<Instant> {
        match self.state(id).map(|s| &s.behavior) {
            Some(Behavior::Transaction { started, .. }) => *started,
            _ => None,
        }
    }

    /// Restores the pre-run properties of the given owned elements
    pub fn recover(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        for id in ids {
            if let Some(element) = self.element_mut(id) {
                element.recover_running_version();
            }
        }
    }

    /// Leaves running mode on every owned element
    pub fn end_run(&mut self) {
        for element in self.owned.iter_mut().flatten() {
            element.end_run();
        }
    }

    fn state(&self, id: NodeId) -> Option<&ControllerState> {
        self.states.get(id.0).and_then(Option::as_ref)
    }

    fn state_mut(&mut self, id: NodeId) -> Option<&mut ControllerState> {
        self.states.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Resets every controller of the tree to its initial state
    pub fn initialize(&mut self) {
        self.initialize_from(self.root);
    }

    fn initialize_from(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if let Some(state) = self.state_mut(node) {
                state.initialize();
                stack.extend(state.children.iter().copied());
            }
        }
    }

    fn reinitialize(&mut self, id: NodeId) {
        if let Some(state) = self.state_mut(id) {
            state.reinitialize();
        }
        if let Some(element) = self.element_mut(id) {
            element.recover_running_version();
        }
    }

    /// Next sampler or transaction end, or `None` when the main loop has
    /// nothing to give right now: finished, stopped, or an endless main
    /// loop whose pass came back empty (see [`ThreadTree::is_done`])
    pub fn next(&mut self, ctx: &mut ThreadContext) -> Option<Pulled> {
        let mut stack = vec![self.root];
        let mut returned: Option<NodeId> = None;

        while let Some(&id) = stack.last() {
            if !ctx.is_running() {
                return None;
            }
            if let Some(child) = returned.take() {
                let child_done = self.state(child).is_some_and(|s| s.done);
                if let Some(state) = self.state_mut(id) {
                    state.child_returned_null(child_done);
                }
            }
            match self.step(id, ctx) {
                Step::Yield(item) => {
                    if let Some((last, above)) = stack.split_last() {
                        for &node in above {
                            if let Some(state) = self.state_mut(node) {
                                state.descendant_yielded();
                            }
                        }
                        if let Some(state) = self.state_mut(*last) {
                            state.pass_yielded = true;
                        }
                    }
                    return Some(item);
                }
                Step::Descend(child) => stack.push(child),
                Step::Null => {
                    stack.pop();
                    returned = Some(id);
                }
                Step::Again => {}
            }
        }
        None
    }

    /// One entry into controller `id`
    fn step(&mut self, id: NodeId, ctx: &mut ThreadContext) -> Step {
        match self.enter(id, ctx) {
            Entry::Proceed => {}
            Entry::Return(step) => return step,
            Entry::EndPass => {
                self.reinitialize(id);
                return Step::Null;
            }
            Entry::Skip => {
                let children: Vec<NodeId> = self
                    .state(id)
                    .map(|s| s.children.clone())
                    .unwrap_or_default();
                for child in children {
                    self.initialize_from(child);
                }
                self.reinitialize(id);
                return Step::Null;
            }
        }

        let is_root = id == self.root;
        let Self {
            template,
            states,
            iteration_started,
            ..
        } = self;
        let Some(state) = states.get_mut(id.0).and_then(Option::as_mut) else {
            return Step::Null;
        };

        if state.first {
            state.first = false;
            if is_root {
                *iteration_started = Some(state.iter_count);
            }
            if let Behavior::Transaction { started, .. } = &mut state.behavior {
                *started = Some(Instant::now());
            }
        }
        if state.done {
            return Step::Null;
        }
        if state.children.is_empty() {
            state.done = true;
            return Step::Null;
        }

        // Random and weighted: one child per entry, drawn among the children
        // that have not come back empty during this entry
        let drawn = match &mut state.behavior {
            Behavior::Random { pick } if !pick.emitted => Some(pick.chosen.or_else(|| {
                let untried = pick.untried(state.children.len());
                (!untried.is_empty()).then(|| untried[rand::rng().random_range(0..untried.len())])
            })),
            Behavior::Weighted { pick, weights, rng } if !pick.emitted => {
                Some(pick.chosen.or_else(|| {
                    let untried = pick.untried(state.children.len());
                    draw_weighted(&untried, &state.children, weights, rng)
                }))
            }
            Behavior::Random { .. } | Behavior::Weighted { .. } => Some(None),
            _ => None,
        };
        if let Some(drawn) = drawn {
            let len = state.children.len();
            let Some(pick) = state.behavior.pick_mut() else {
                return Step::Null;
            };
            let Some(index) = drawn.filter(|&i| i < len) else {
                pick.reset();
                self.reinitialize(id);
                return Step::Null;
            };
            pick.chosen = Some(index);
            let child = state.children[index];
            if is_sampler(template, child) {
                pick.emitted = true;
                return Step::Yield(Pulled::Sampler(child));
            }
            return Step::Descend(child);
        }

        match &mut state.behavior {
            Behavior::Interleave { emitted, attempts } => {
                if *emitted || *attempts >= state.children.len() {
                    *emitted = false;
                    *attempts = 0;
                    self.reinitialize(id);
                    return Step::Null;
                }
                if state.current >= state.children.len() {
                    state.current = 0;
                }
                let child = state.children[state.current];
                if is_sampler(template, child) {
                    *emitted = true;
                    state.current += 1;
                    return Step::Yield(Pulled::Sampler(child));
                }
                return Step::Descend(child);
            }
            _ => {}
        }

        if state.current < state.children.len() {
            let child = state.children[state.current];
            if is_sampler(template, child) {
                state.increment_current();
                Step::Yield(Pulled::Sampler(child))
            } else {
                Step::Descend(child)
            }
        } else {
            self.next_is_null(id, ctx)
        }
    }

    /// Kind-specific checks made every time a controller is entered
    fn enter(&mut self, id: NodeId, ctx: &mut ThreadContext) -> Entry {
        let Self {
            template,
            owned,
            states,
            ..
        } = self;
        let element = element_in(owned, template, id);
        let Some(state) = states.get_mut(id.0).and_then(Option::as_mut) else {
            return Entry::Return(Step::Null);
        };
        let first = state.first;

        match &mut state.behavior {
            Behavior::Loop {
                counter,
                continue_forever,
            } => {
                ctx.variables
                    .put(index_variable(element), counter.count.to_string());
                if counter.break_pending {
                    counter.break_pending = false;
                    counter.reset();
                    if !*continue_forever {
                        state.done = true;
                    }
                    return Entry::Return(Step::Null);
                }
                let limit = *counter.limit.get_or_insert_with(|| loop_limit(element, ctx));
                if limit >= 0 && counter.count >= limit {
                    if !*continue_forever {
                        state.done = true;
                    }
                    return Entry::Return(Step::Null);
                }
                Entry::Proceed
            }
            Behavior::While { counter } => {
                ctx.variables
                    .put(index_variable(element), counter.count.to_string());
                if counter.break_pending {
                    counter.break_pending = false;
                    counter.reset();
                    return Entry::Return(Step::Null);
                }
                if first && while_ends(element, ctx, false) {
                    return Entry::Return(Step::Null);
                }
                Entry::Proceed
            }
            Behavior::If => {
                if (first || element.bool(EVALUATE_ALL, ctx)) && !if_holds(element, ctx) {
                    return Entry::Skip;
                }
                Entry::Proceed
            }
            Behavior::Switch => {
                if first {
                    let names: Vec<String> = state
                        .children
                        .iter()
                        .map(|&c| element_in(owned, template, c).name())
                        .collect();
                    match switch_selection(&element.text(SELECTION, ctx), &names) {
                        Some(index) => state.current = index,
                        None => return Entry::EndPass,
                    }
                }
                Entry::Proceed
            }
            Behavior::OnceOnly { ran } => {
                if *ran {
                    return Entry::Return(Step::Null);
                }
                Entry::Proceed
            }
            Behavior::Weighted { weights, .. } => {
                if first {
                    *weights = child_weights(element, &state.all_children, ctx);
                }
                Entry::Proceed
            }
            Behavior::ForEach { counter } => {
                ctx.variables
                    .put(index_variable(element), counter.count.to_string());
                if counter.break_pending {
                    counter.break_pending = false;
                    counter.reset();
                    return Entry::Return(Step::Null);
                }
                if first {
                    match foreach_value(element, counter.count, ctx) {
                        Some((output, value)) => {
                            if !output.is_empty() {
                                ctx.variables.put(output, value);
                            }
                        }
                        None => {
                            counter.reset();
                            return Entry::Return(Step::Null);
                        }
                    }
                }
                Entry::Proceed
            }
            Behavior::Runtime { started } => {
                let since = *started.get_or_insert_with(Instant::now);
                if since.elapsed() >= runtime_limit(element, ctx) {
                    *started = None;
                    return Entry::EndPass;
                }
                Entry::Proceed
            }
            Behavior::Generic
            | Behavior::Random { .. }
            | Behavior::Transaction { .. }
            | Behavior::Interleave { .. } => Entry::Proceed,
        }
    }

    /// End of a controller's children
    fn next_is_null(&mut self, id: NodeId, ctx: &mut ThreadContext) -> Step {
        let Self {
            template,
            owned,
            states,
            ..
        } = self;
        let element = element_in(owned, template, id);
        let Some(state) = states.get_mut(id.0).and_then(Option::as_mut) else {
            return Step::Null;
        };
        let yielded = state.pass_yielded;

        let step = match &mut state.behavior {
            Behavior::Transaction { ended, started } => {
                if !*ended {
                    *ended = true;
                    return Step::Yield(Pulled::TransactionEnd(id));
                }
                *ended = false;
                *started = None;
                Step::Null
            }
            Behavior::Loop {
                counter,
                continue_forever,
            } => {
                counter.count += 1;
                let limit = *counter.limit.get_or_insert_with(|| loop_limit(element, ctx));
                if limit >= 0 && counter.count >= limit {
                    if !*continue_forever {
                        state.done = true;
                    } else {
                        counter.reset();
                    }
                    Step::Null
                } else if limit < 0 && !yielded {
                    warn!(controller = %element.name(), "Infinite loop pass produced no samples");
                    Step::Null
                } else {
                    Step::Again
                }
            }
            Behavior::While { counter } => {
                counter.count += 1;
                if while_ends(element, ctx, true) {
                    counter.reset();
                    Step::Null
                } else if !yielded {
                    debug!(controller = %element.name(), "While pass produced no samples");
                    Step::Null
                } else {
                    Step::Again
                }
            }
            Behavior::ForEach { counter } => {
                counter.count += 1;
                Step::Again
            }
            Behavior::Runtime { started } => {
                let expired = started.is_none_or(|s| s.elapsed() >= runtime_limit(element, ctx));
                if expired {
                    *started = None;
                    Step::Null
                } else if !yielded {
                    Step::Null
                } else {
                    Step::Again
                }
            }
            Behavior::OnceOnly { ran } => {
                *ran = true;
                Step::Null
            }
            Behavior::Generic
            | Behavior::If
            | Behavior::Random { .. }
            | Behavior::Weighted { .. }
            | Behavior::Interleave { .. }
            | Behavior::Switch => Step::Null,
        };
        self.reinitialize(id);
        step
    }

    /// Ends the current iteration of every controller between `sampler` and
    /// the root, so the main loop starts its next pass.
    ///
    /// Returns the transaction controllers whose pass was cut short, innermost first.
    pub fn start_next_thread_loop(&mut self, sampler: NodeId) -> Vec<NodeId> {
        let path = self.path_to_root(sampler);
        let mut cut = Vec::new();
        for &id in &path {
            self.end_iteration(id, &mut cut, id == self.root);
        }
        cut
    }

    /// Leaves the innermost loop around `sampler`
    pub fn break_loop(&mut self, sampler: NodeId) -> Vec<NodeId> {
        self.innermost_loop_action(sampler, true)
    }

    /// Starts the next pass of the innermost loop around `sampler`
    pub fn continue_loop(&mut self, sampler: NodeId) -> Vec<NodeId> {
        self.innermost_loop_action(sampler, false)
    }

    fn innermost_loop_action(&mut self, sampler: NodeId, breaking: bool) -> Vec<NodeId> {
        let path = self.path_to_root(sampler);
        let mut cut = Vec::new();
        for &id in &path {
            let is_loop = id == self.root
                || self
                    .template
                    .get(id)
                    .component
                    .controller_kind()
                    .is_some_and(|k| k.is_iterating());
            if !is_loop {
                self.end_iteration(id, &mut cut, false);
                continue;
            }
            self.reinitialize(id);
            if let Some(counter) = self.state_mut(id).and_then(|s| s.behavior.counter_mut()) {
                if breaking {
                    counter.reset();
                    counter.break_pending = true;
                } else {
                    counter.count += 1;
                }
            }
            break;
        }
        cut
    }

    fn end_iteration(&mut self, id: NodeId, cut: &mut Vec<NodeId>, counts_iteration: bool) {
        let Some(state) = self.state_mut(id) else {
            return;
        };
        match &mut state.behavior {
            Behavior::Transaction { started, ended } => {
                if started.is_some() && !*ended {
                    cut.push(id);
                }
                *started = None;
                *ended = false;
            }
            Behavior::Loop { counter, .. } if counts_iteration => counter.count += 1,
            Behavior::Loop { counter, .. }
            | Behavior::While { counter }
            | Behavior::ForEach { counter } => counter.reset(),
            Behavior::Runtime { started } => *started = None,
            Behavior::Random { pick } | Behavior::Weighted { pick, .. } => pick.reset(),
            Behavior::Interleave { emitted, attempts } => {
                *emitted = false;
                *attempts = 0;
            }
            Behavior::Generic | Behavior::If | Behavior::Switch | Behavior::OnceOnly { .. } => {}
        }
        self.reinitialize(id);
    }

    /// Controllers from the parent of `node` up to this tree's root
    fn path_to_root(&self, node: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        for id in self.template.ancestors(node) {
            if self.state(id).is_some() {
                path.push(id);
            }
            if id == self.root {
                break;
            }
        }
        path
    }
}

fn index_variable(element: &TestElement) -> String {
    format!("{}{}", element.name(), INDEX_SUFFIX)
}

fn loop_limit(element: &TestElement, ctx: &mut ThreadContext) -> i64 {
    element.int_or(LOOPS, 0, ctx)
}

fn runtime_limit(element: &TestElement, ctx: &mut ThreadContext) -> Duration {
    let seconds = element.float(SECONDS, ctx).unwrap_or(0.0);
    Duration::from_secs_f64(seconds.max(0.0))
}

/// Whether a while controller stops, checked at pass start or pass end
fn while_ends(element: &TestElement, ctx: &mut ThreadContext, pass_end: bool) -> bool {
    let condition = element.text(CONDITION, ctx);
    let condition = condition.trim();
    if (pass_end && condition.is_empty()) || condition.eq_ignore_ascii_case("LAST") {
        !ctx.variables.last_sample_ok()
    } else {
        condition.eq_ignore_ascii_case("false")
    }
}

fn if_holds(element: &TestElement, ctx: &mut ThreadContext) -> bool {
    let condition = element.text(CONDITION, ctx);
    let use_expression = match element.property(USE_EXPRESSION) {
        Some(_) => element.bool(USE_EXPRESSION, ctx),
        None => true,
    };
    if use_expression {
        return condition.trim().eq_ignore_ascii_case("true");
    }
    match ctx.eval_script(condition.trim()) {
        Ok(value) => value.trim() == "true",
        Err(e) => {
            warn!(controller = %element.name(), condition = %condition, "Condition failed: {}", e);
            false
        }
    }
}

/// Weight of every child of a weighted controller, in plan order
fn child_weights(
    element: &TestElement,
    children: &[NodeId],
    ctx: &mut ThreadContext,
) -> Vec<(NodeId, u64)> {
    let listed = element.text(WEIGHTS, ctx);
    let mut parsed = listed.split(',').map(str::trim);
    children
        .iter()
        .map(|&child| {
            let weight = match parsed.next() {
                None | Some("") => 0,
                Some(text) => text.parse::<i64>().unwrap_or_else(|_| {
                    warn!(controller = %element.name(), weight = %text, "Invalid weight");
                    0
                }),
            };
            (child, weight.max(0) as u64)
        })
        .collect()
}

/// Position among `untried` drawn in proportion to the children's weights
fn draw_weighted(
    untried: &[usize],
    children: &[NodeId],
    weights: &[(NodeId, u64)],
    rng: &mut StdRng,
) -> Option<usize> {
    let weight = |i: usize| {
        weights
            .iter()
            .find(|(id, _)| *id == children[i])
            .map_or(0, |(_, w)| *w)
    };
    let total: u64 = untried.iter().map(|&i| weight(i)).sum();
    if total == 0 {
        return None;
    }
    let mut roll = rng.random_range(0..total);
    for &i in untried {
        let w = weight(i);
        if roll < w {
            return Some(i);
        }
        roll -= w;
    }
    None
}

/// Index of the child a switch controller runs, if any
fn switch_selection(selection: &str, names: &[String]) -> Option<usize> {
    let selection = selection.trim();
    if selection.is_empty() {
        return Some(0);
    }
    if let Ok(index) = selection.parse::<i64>() {
        return match usize::try_from(index) {
            Ok(i) if i < names.len() => Some(i),
            _ => Some(0),
        };
    }
    names
        .iter()
        .position(|n| n == selection)
        .or_else(|| names.iter().position(|n| n == "default"))
}

/// Output variable and value for the next foreach pass, or `None` at the end
fn foreach_value(
    element: &TestElement,
    count: i64,
    ctx: &mut ThreadContext,
) -> Option<(String, String)> {
    let start = element.int_or(START_INDEX, 0, ctx);
    let end = element.int_or(END_INDEX, -1, ctx);
    let index = start + count + 1;
    if end >= 0 && index > end {
        return None;
    }
    let prefix = element.text(INPUT_PREFIX, ctx);
    let separator = match element.property(USE_SEPARATOR) {
        Some(_) if !element.bool(USE_SEPARATOR, ctx) => "",
        _ => "_",
    };
    let value = ctx
        .variables
        .get(&format!("{prefix}{separator}{index}"))?
        .to_string();
    Some((element.text(OUTPUT_VAR, ctx), value))
}
