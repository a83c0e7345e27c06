//! Live threads of one thread group

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use volley_core::ThreadSignal;

/// Key of a thread within its group: the 1-based thread number
pub type ThreadKey = usize;

#[derive(Debug, Clone)]
struct ThreadEntry {
    name: String,
    signal: Arc<ThreadSignal>,
}

#[derive(Debug, Default)]
struct RegistryState {
    threads: HashMap<ThreadKey, ThreadEntry>,
    /// Threads expected to run that have not finished, started or not
    pending: usize,
}

/// Registry of a group's threads.
///
/// Threads are added when they start and removed by their own completion
/// guard; waiters are woken on every removal.
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    state: Mutex<RegistryState>,
    changed: Condvar,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announces `count` threads that will be started
    pub fn expect(&self, count: usize) {
        self.state.lock().pending += count;
    }

    /// Withdraws announced threads that will never start
    pub fn abandon(&self, count: usize) {
        let mut state = self.state.lock();
        state.pending = state.pending.saturating_sub(count);
        self.changed.notify_all();
    }

    pub fn register(&self, key: ThreadKey, name: impl Into<String>, signal: Arc<ThreadSignal>) {
        let mut state = self.state.lock();
        state.threads.insert(
            key,
            ThreadEntry {
                name: name.into(),
                signal,
            },
        );
    }

    /// Called once by each thread when it ends
    pub fn finished(&self, key: ThreadKey) {
        let mut state = self.state.lock();
        if state.threads.remove(&key).is_some() {
            state.pending = state.pending.saturating_sub(1);
        }
        self.changed.notify_all();
    }

    pub fn active_threads(&self) -> usize {
        self.state.lock().threads.len()
    }

    /// Names and keys of live threads, ordered by key
    pub fn threads(&self) -> Vec<(ThreadKey, String)> {
        let state = self.state.lock();
        let mut threads: Vec<_> = state
            .threads
            .iter()
            .map(|(k, e)| (*k, e.name.clone()))
            .collect();
        threads.sort();
        threads
    }

    /// Stop every live thread; `now` also interrupts blocking waits
    pub fn stop_all(&self, now: bool) {
        let signals: Vec<Arc<ThreadSignal>> = self
            .state
            .lock()
            .threads
            .values()
            .map(|e| e.signal.clone())
            .collect();
        for signal in signals {
            if now {
                signal.interrupt();
            } else {
                signal.stop();
            }
        }
    }

    /// Stops the thread called `name`, returning whether it was found
    pub fn stop_thread(&self, name: &str, now: bool) -> bool {
        let signal = self
            .state
            .lock()
            .threads
            .values()
            .find(|e| e.name == name)
            .map(|e| e.signal.clone());
        match signal {
            Some(signal) => {
                if now {
                    signal.interrupt();
                } else {
                    signal.stop();
                }
                true
            }
            None => false,
        }
    }

    /// Waits until every expected thread finished; `None` waits forever.
    ///
    /// Returns `false` on timeout.
    pub fn wait_threads_stopped(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        while state.pending > 0 {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut state, deadline).timed_out() {
                        return state.pending == 0;
                    }
                }
                None => self.changed.wait(&mut state),
            }
        }
        true
    }

    /// Waits up to `timeout` for one thread to finish
    pub fn wait_for(&self, key: ThreadKey, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.threads.contains_key(&key) {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return !state.threads.contains_key(&key);
            }
        }
        true
    }
}
