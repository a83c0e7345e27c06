//! Stop and interrupt signalling for virtual-user threads

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared between a running thread and whoever may stop it.
///
/// `stop` is the cooperative request checked between samples. `interrupt`
/// additionally wakes blocking waits made through [`ThreadSignal::block_for`].
#[derive(Debug)]
pub struct ThreadSignal {
    running: AtomicBool,
    interrupted: Mutex<bool>,
    wake: Condvar,
}

impl ThreadSignal {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            interrupted: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_interrupted(&self) -> bool {
        *self.interrupted.lock()
    }

    /// Ask the thread to stop after its current sample
    pub fn stop(&self) {
        let _guard = self.interrupted.lock();
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_all();
    }

    /// Stop and break any blocking wait in progress
    pub fn interrupt(&self) {
        let mut interrupted = self.interrupted.lock();
        self.running.store(false, Ordering::SeqCst);
        *interrupted = true;
        self.wake.notify_all();
    }

    /// Waits up to `duration` while the thread is running.
    ///
    /// Used for ramp-up, scheduler and timer delays. Returns `true` when the
    /// whole duration elapsed and the thread is still running.
    pub fn pause(&self, duration: Duration) -> bool {
        self.wait(duration, |signal, interrupted| {
            interrupted || !signal.running.load(Ordering::SeqCst)
        })
    }

    /// Waits until `deadline` while the thread is running
    pub fn pause_until(&self, deadline: Instant) -> bool {
        self.pause(deadline.saturating_duration_since(Instant::now()))
    }

    /// Waits up to `duration` unless interrupted.
    ///
    /// Used by samplers simulating blocking work: a cooperative stop lets the
    /// work finish, an interrupt cuts it short. Returns `true` if not interrupted.
    pub fn block_for(&self, duration: Duration) -> bool {
        self.wait(duration, |_, interrupted| interrupted)
    }

    fn wait(&self, duration: Duration, done: impl Fn(&Self, bool) -> bool) -> bool {
        let deadline = Instant::now() + duration;
        let mut interrupted = self.interrupted.lock();
        loop {
            if done(self, *interrupted) {
                return false;
            }
            if Instant::now() >= deadline {
                return true;
            }
            let _ = self.wake.wait_until(&mut interrupted, deadline);
        }
    }
}

impl Default for ThreadSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_pause_completes_when_running() {
        let signal = ThreadSignal::new();
        assert!(signal.pause(Duration::from_millis(5)));
        assert!(signal.is_running());
    }

    #[test]
    fn test_stop_cuts_pause_short() {
        let signal = Arc::new(ThreadSignal::new());
        let waiter = {
            let signal = signal.clone();
            thread::spawn(move || {
                let started = Instant::now();
                let completed = signal.pause(Duration::from_secs(10));
                (completed, started.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(20));
        signal.stop();

        let (completed, elapsed) = waiter.join().unwrap();
        assert!(!completed);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_block_only_ends_on_interrupt() {
        let signal = ThreadSignal::new();
        signal.stop();
        assert!(signal.block_for(Duration::from_millis(5)));

        signal.interrupt();
        assert!(signal.is_interrupted());
        assert!(!signal.block_for(Duration::from_secs(10)));
    }
}
