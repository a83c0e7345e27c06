//! Timers

use parking_lot::Mutex;
use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::warn;
use volley_core::expr::next_function_id;
use volley_core::{ElementSpec, PropertySpec, TestElement, ThreadContext, Timer};

pub const DELAY: &str = "delay";
pub const RANGE: &str = "range";
/// Target samples per minute
pub const THROUGHPUT: &str = "throughput";
pub const CALC_MODE: &str = "calc_mode";

pub const CONSTANT_TIMER_SPEC: ElementSpec = ElementSpec {
    kind: "constant_timer",
    clonable: true,
    properties: &[PropertySpec::text(DELAY, "300")],
};

pub const UNIFORM_RANDOM_TIMER_SPEC: ElementSpec = ElementSpec {
    kind: "uniform_random_timer",
    clonable: true,
    properties: &[
        PropertySpec::text(DELAY, "0"),
        PropertySpec::text(RANGE, "100"),
    ],
};

pub const CONSTANT_THROUGHPUT_TIMER_SPEC: ElementSpec = ElementSpec {
    kind: "constant_throughput_timer",
    clonable: true,
    properties: &[
        PropertySpec::text(THROUGHPUT, "60"),
        PropertySpec::text(CALC_MODE, "this_thread"),
    ],
};

fn millis(element: &TestElement, key: &str, ctx: &mut ThreadContext) -> f64 {
    match element.float(key, ctx) {
        Ok(ms) if ms.is_finite() && ms >= 0.0 => ms,
        Ok(ms) => {
            warn!(timer = %element.name(), "Ignoring {} of {} ms", key, ms);
            0.0
        }
        Err(e) => {
            warn!(timer = %element.name(), "{}", e);
            0.0
        }
    }
}

/// Waits `delay` milliseconds before every sampler in scope
#[derive(Debug, Default)]
pub struct ConstantTimer;

impl Timer for ConstantTimer {
    fn delay(&self, element: &TestElement, ctx: &mut ThreadContext) -> Duration {
        Duration::from_secs_f64(millis(element, DELAY, ctx) / 1000.0)
    }
}

/// Waits `delay` plus a uniformly drawn `[0, range)` milliseconds
#[derive(Debug, Default)]
pub struct UniformRandomTimer;

impl Timer for UniformRandomTimer {
    fn delay(&self, element: &TestElement, ctx: &mut ThreadContext) -> Duration {
        let base = millis(element, DELAY, ctx);
        let range = millis(element, RANGE, ctx);
        let jitter = if range > 0.0 {
            rand::rng().random_range(0.0..range)
        } else {
            0.0
        };
        Duration::from_secs_f64((base + jitter) / 1000.0)
    }
}

/// Whose samples a constant throughput timer paces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThroughputMode {
    /// Every thread keeps the target on its own
    #[default]
    ThisThread,
    /// All threads in the timer's scope share one schedule
    Shared,
}

impl ThroughputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThroughputMode::ThisThread => "this_thread",
            ThroughputMode::Shared => "shared",
        }
    }
}

impl fmt::Display for ThroughputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThroughputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "this_thread" | "" => Ok(ThroughputMode::ThisThread),
            "shared" => Ok(ThroughputMode::Shared),
            other => Err(format!("Unknown throughput mode: {}", other)),
        }
    }
}

/// Delays samplers so they run at `throughput` samples per minute.
///
/// A sampler running behind schedule is not delayed; the schedule restarts
/// from the moment it runs.
#[derive(Debug)]
pub struct ConstantThroughputTimer {
    /// Key of each thread's own schedule in its context
    id: u64,
    created: Instant,
    shared: Mutex<Option<Instant>>,
}

impl ConstantThroughputTimer {
    pub fn new() -> Self {
        Self {
            id: next_function_id(),
            created: Instant::now(),
            shared: Mutex::new(None),
        }
    }

    fn interval(element: &TestElement, ctx: &mut ThreadContext) -> Option<Duration> {
        match element.float(THROUGHPUT, ctx) {
            Ok(per_minute) if per_minute.is_finite() && per_minute > 0.0 => {
                Some(Duration::from_secs_f64(60.0 / per_minute))
            }
            Ok(_) => None,
            Err(e) => {
                warn!(timer = %element.name(), "{}", e);
                None
            }
        }
    }

    fn this_thread(&self, interval: Duration, ctx: &mut ThreadContext) -> Duration {
        let now = self.created.elapsed();
        // Milliseconds since creation of the previous target, plus one; 0 before the first sample
        let slot = ctx.function_state(self.id);
        let target = (*slot > 0).then(|| Duration::from_millis((*slot - 1) as u64) + interval);
        match target {
            Some(target) if target > now => {
                *slot = target.as_millis() as i64 + 1;
                target - now
            }
            _ => {
                *slot = now.as_millis() as i64 + 1;
                Duration::ZERO
            }
        }
    }

    fn shared(&self, interval: Duration) -> Duration {
        let now = Instant::now();
        let mut last = self.shared.lock();
        let next = match *last {
            Some(previous) => (previous + interval).max(now),
            None => now,
        };
        *last = Some(next);
        next - now
    }
}

impl Default for ConstantThroughputTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for ConstantThroughputTimer {
    fn delay(&self, element: &TestElement, ctx: &mut ThreadContext) -> Duration {
        let Some(interval) = Self::interval(element, ctx) else {
            return Duration::ZERO;
        };
        let mode = element.text(CALC_MODE, ctx).parse().unwrap_or_else(|e: String| {
            warn!(timer = %element.name(), "{}, pacing this thread only", e);
            ThroughputMode::ThisThread
        });
        match mode {
            ThroughputMode::ThisThread => self.this_thread(interval, ctx),
            ThroughputMode::Shared => self.shared(interval),
        }
    }
}
