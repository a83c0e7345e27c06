//! Per-thread iteration state of one controller

use crate::kind::ControllerKind;
use crate::tree::NodeId;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Instant;

/// Counter shared by the iterating controllers
#[derive(Debug, Default, Clone)]
pub(crate) struct LoopCounter {
    /// Completed passes in the current run of the loop
    pub count: i64,
    /// Loop limit, evaluated once per run
    pub limit: Option<i64>,
    /// Set by a break; the next entry reports the loop as finished
    pub break_pending: bool,
}

impl LoopCounter {
    pub fn reset(&mut self) {
        self.count = 0;
        self.limit = None;
    }
}

/// One-child-per-entry selection of the random and weighted controllers
#[derive(Debug, Default, Clone)]
pub(crate) struct Pick {
    /// Position of the child entered during the current entry
    pub chosen: Option<usize>,
    /// Set once the current entry produced a sampler
    pub emitted: bool,
    /// Positions of children that came back empty during the current entry
    tried: Vec<bool>,
}

impl Pick {
    pub fn reset(&mut self) {
        self.chosen = None;
        self.emitted = false;
        self.tried.clear();
    }

    /// Positions not yet tried during the current entry
    pub fn untried(&self, len: usize) -> Vec<usize> {
        (0..len)
            .filter(|&i| !self.tried.get(i).copied().unwrap_or(false))
            .collect()
    }

    /// The chosen child came back empty; a done child leaves `children`
    fn returned_null(&mut self, children: &mut Vec<NodeId>, child_done: bool) {
        let Some(index) = self.chosen.take() else {
            return;
        };
        if child_done {
            if index < children.len() {
                children.remove(index);
            }
            if index < self.tried.len() {
                self.tried.remove(index);
            }
        } else {
            if self.tried.len() <= index {
                self.tried.resize(index + 1, false);
            }
            self.tried[index] = true;
        }
    }
}

/// Kind-specific state
#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    Generic,
    Loop {
        counter: LoopCounter,
        continue_forever: bool,
    },
    While {
        counter: LoopCounter,
    },
    If,
    Random {
        pick: Pick,
    },
    Weighted {
        pick: Pick,
        /// Weight of each child, evaluated when an entry starts
        weights: Vec<(NodeId, u64)>,
        rng: StdRng,
    },
    Transaction {
        started: Option<Instant>,
        ended: bool,
    },
    Interleave {
        emitted: bool,
        attempts: usize,
    },
    Switch,
    OnceOnly {
        ran: bool,
    },
    ForEach {
        counter: LoopCounter,
    },
    Runtime {
        started: Option<Instant>,
    },
}

impl Behavior {
    pub fn for_kind(kind: ControllerKind) -> Self {
        match kind {
            ControllerKind::Generic | ControllerKind::Include => Behavior::Generic,
            ControllerKind::Loop => Behavior::Loop {
                counter: LoopCounter::default(),
                continue_forever: true,
            },
            ControllerKind::While => Behavior::While {
                counter: LoopCounter::default(),
            },
            ControllerKind::If => Behavior::If,
            ControllerKind::Random => Behavior::Random {
                pick: Pick::default(),
            },
            ControllerKind::Weighted => Behavior::Weighted {
                pick: Pick::default(),
                weights: Vec::new(),
                rng: StdRng::from_rng(&mut rand::rng()),
            },
            ControllerKind::Transaction => Behavior::Transaction {
                started: None,
                ended: false,
            },
            ControllerKind::Interleave => Behavior::Interleave {
                emitted: false,
                attempts: 0,
            },
            ControllerKind::Switch => Behavior::Switch,
            ControllerKind::OnceOnly => Behavior::OnceOnly { ran: false },
            ControllerKind::ForEach => Behavior::ForEach {
                counter: LoopCounter::default(),
            },
            ControllerKind::Runtime => Behavior::Runtime { started: None },
        }
    }

    /// The thread group's main loop: ends the thread when its count is reached
    pub fn main_loop() -> Self {
        Behavior::Loop {
            counter: LoopCounter::default(),
            continue_forever: false,
        }
    }

    pub fn pick_mut(&mut self) -> Option<&mut Pick> {
        match self {
            Behavior::Random { pick } | Behavior::Weighted { pick, .. } => Some(pick),
            _ => None,
        }
    }

    pub fn counter_mut(&mut self) -> Option<&mut LoopCounter> {
        match self {
            Behavior::Loop { counter, .. }
            | Behavior::While { counter }
            | Behavior::ForEach { counter } => Some(counter),
            _ => None,
        }
    }

    /// Clears per-run state; a once-only controller remembers that it ran
    fn reset(&mut self) {
        match self {
            Behavior::Loop { counter, .. }
            | Behavior::While { counter }
            | Behavior::ForEach { counter } => {
                counter.reset();
                counter.break_pending = false;
            }
            Behavior::Random { pick } | Behavior::Weighted { pick, .. } => pick.reset(),
            Behavior::Transaction { started, ended } => {
                *started = None;
                *ended = false;
            }
            Behavior::Interleave { emitted, attempts } => {
                *emitted = false;
                *attempts = 0;
            }
            Behavior::Runtime { started } => *started = None,
            Behavior::Generic | Behavior::If | Behavior::Switch | Behavior::OnceOnly { .. } => {}
        }
    }
}

/// Iteration state of one controller within one thread
#[derive(Debug, Clone)]
pub(crate) struct ControllerState {
    pub behavior: Behavior,
    /// Walkable children as materialized, restored by `initialize`
    pub all_children: Vec<NodeId>,
    /// Children still taking part; done sub-controllers are dropped
    pub children: Vec<NodeId>,
    pub current: usize,
    pub iter_count: u64,
    pub done: bool,
    pub first: bool,
    /// Whether anything was yielded since the pass started
    pub pass_yielded: bool,
}

impl ControllerState {
    pub fn new(behavior: Behavior, children: Vec<NodeId>) -> Self {
        Self {
            behavior,
            all_children: children.clone(),
            children,
            current: 0,
            iter_count: 0,
            done: false,
            first: true,
            pass_yielded: false,
        }
    }

    /// Back to the state before the first pass
    pub fn initialize(&mut self) {
        self.children = self.all_children.clone();
        self.current = 0;
        self.iter_count = 0;
        self.done = false;
        self.first = true;
        self.pass_yielded = false;
        self.behavior.reset();
    }

    /// Prepares the next pass; an interleave keeps its position
    pub fn reinitialize(&mut self) {
        if !matches!(self.behavior, Behavior::Interleave { .. }) {
            self.current = 0;
        }
        self.iter_count += 1;
        self.first = true;
        self.pass_yielded = false;
    }

    pub fn increment_current(&mut self) {
        match self.behavior {
            // A switch runs only its selected child
            Behavior::Switch => self.current = self.children.len(),
            _ => self.current += 1,
        }
    }

    /// Bookkeeping after the current child controller reported no sampler
    pub fn child_returned_null(&mut self, child_done: bool) {
        match &mut self.behavior {
            Behavior::Random { pick } | Behavior::Weighted { pick, .. } => {
                pick.returned_null(&mut self.children, child_done)
            }
            Behavior::Interleave { attempts, .. } => {
                *attempts += 1;
                self.remove_or_advance(child_done);
            }
            Behavior::Switch => self.current = self.children.len(),
            _ => self.remove_or_advance(child_done),
        }
    }

    fn remove_or_advance(&mut self, child_done: bool) {
        if child_done && self.current < self.children.len() {
            self.children.remove(self.current);
        } else {
            self.current += 1;
        }
    }

    /// A sampler was yielded somewhere below this controller
    pub fn descendant_yielded(&mut self) {
        self.pass_yielded = true;
        match &mut self.behavior {
            Behavior::Random { pick } | Behavior::Weighted { pick, .. } => pick.emitted = true,
            Behavior::Interleave { emitted, .. } => {
                *emitted = true;
                self.current += 1;
            }
            _ => {}
        }
    }
}
