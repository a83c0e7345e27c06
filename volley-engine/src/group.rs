//! Thread group and test plan properties

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use volley_control::GroupKind;
use volley_core::{DefaultValue, ElementSpec, PropertySpec, PropertyType, TestElement, ThreadContext};

pub const NUM_THREADS: &str = "num_threads";
pub const RAMP_UP: &str = "ramp_up";
pub const DELAYED_START: &str = "delayed_start";
pub const SCHEDULER: &str = "scheduler";
pub const DURATION: &str = "duration";
pub const DELAY: &str = "delay";
pub const ON_ERROR: &str = "on_error";

pub const SERIALIZED: &str = "serialized";
pub const TEAR_DOWN_ON_SHUTDOWN: &str = "tear_down_on_shutdown";

const GROUP_PROPERTIES: &[PropertySpec] = &[
    PropertySpec::int(NUM_THREADS, 1),
    PropertySpec::float(RAMP_UP, 0.0),
    PropertySpec::text(volley_control::kind::LOOPS, "1"),
    // Unset means the engine-wide default
    PropertySpec {
        name: DELAYED_START,
        kind: PropertyType::Bool,
        default: DefaultValue::None,
    },
    PropertySpec::bool(SCHEDULER, false),
    PropertySpec::int(DURATION, 0),
    PropertySpec::int(DELAY, 0),
    PropertySpec::text(ON_ERROR, "continue"),
];

pub const THREAD_GROUP_SPEC: ElementSpec = ElementSpec {
    kind: "thread_group",
    clonable: true,
    properties: GROUP_PROPERTIES,
};

pub const SETUP_GROUP_SPEC: ElementSpec = ElementSpec {
    kind: "setup_thread_group",
    clonable: true,
    properties: GROUP_PROPERTIES,
};

pub const TEARDOWN_GROUP_SPEC: ElementSpec = ElementSpec {
    kind: "teardown_thread_group",
    clonable: true,
    properties: GROUP_PROPERTIES,
};

pub const TEST_PLAN_SPEC: ElementSpec = ElementSpec {
    kind: "test_plan",
    clonable: false,
    properties: &[
        PropertySpec::bool(SERIALIZED, false),
        PropertySpec::bool(TEAR_DOWN_ON_SHUTDOWN, true),
    ],
};

/// Schema of the thread group element for `kind`
pub fn group_spec(kind: GroupKind) -> &'static ElementSpec {
    match kind {
        GroupKind::Setup => &SETUP_GROUP_SPEC,
        GroupKind::Regular => &THREAD_GROUP_SPEC,
        GroupKind::Teardown => &TEARDOWN_GROUP_SPEC,
    }
}

/// What a thread does after a failed sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnError {
    #[default]
    Continue,
    StartNextLoop,
    StopThread,
    StopTest,
    StopTestNow,
}

impl OnError {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnError::Continue => "continue",
            OnError::StartNextLoop => "start_next_loop",
            OnError::StopThread => "stop_thread",
            OnError::StopTest => "stop_test",
            OnError::StopTestNow => "stop_test_now",
        }
    }
}

impl fmt::Display for OnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OnError {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" | "" => Ok(OnError::Continue),
            "start_next_loop" => Ok(OnError::StartNextLoop),
            "stop_thread" => Ok(OnError::StopThread),
            "stop_test" => Ok(OnError::StopTest),
            "stop_test_now" => Ok(OnError::StopTestNow),
            other => Err(format!("Unknown on_error action: {}", other)),
        }
    }
}

/// Thread group settings read once when the group starts
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSettings {
    pub name: String,
    pub num_threads: usize,
    pub ramp_up: Duration,
    pub delayed_start: bool,
    /// `(delay, duration)` when the scheduler is on
    pub scheduler: Option<(Duration, Duration)>,
    pub on_error: OnError,
}

impl GroupSettings {
    /// Reads the group element; `delayed_start_default` applies when the
    /// element does not say
    pub fn from_element(
        element: &TestElement,
        delayed_start_default: bool,
        ctx: &mut ThreadContext,
    ) -> Self {
        let num_threads = element.int_or(NUM_THREADS, 1, ctx).max(0) as usize;
        let ramp_up = element.float(RAMP_UP, ctx).unwrap_or(0.0).max(0.0);
        let delayed_start = match element.property(DELAYED_START) {
            Some(_) => element.bool(DELAYED_START, ctx),
            None => delayed_start_default,
        };
        let scheduler = element.bool(SCHEDULER, ctx).then(|| {
            let delay = element.int_or(DELAY, 0, ctx).max(0) as u64;
            let duration = element.int_or(DURATION, 0, ctx).max(0) as u64;
            (Duration::from_secs(delay), Duration::from_secs(duration))
        });
        let on_error = element.text(ON_ERROR, ctx).parse().unwrap_or_else(|e: String| {
            tracing::warn!(group = %element.name(), "{}, continuing on errors", e);
            OnError::Continue
        });

        Self {
            name: element.label(ctx),
            num_threads,
            ramp_up: Duration::from_secs_f64(ramp_up),
            delayed_start,
            scheduler,
            on_error,
        }
    }

    /// Start offset of thread `index` (0-based) within the ramp-up period
    pub fn ramp_delay(&self, index: usize) -> Duration {
        ramp_delay(self.ramp_up, index, self.num_threads)
    }
}

/// `round(ramp_up_ms * index / num_threads)` milliseconds
pub fn ramp_delay(ramp_up: Duration, index: usize, num_threads: usize) -> Duration {
    if num_threads == 0 {
        return Duration::ZERO;
    }
    let ms = ramp_up.as_secs_f64() * 1000.0 * index as f64 / num_threads as f64;
    Duration::from_millis(ms.round() as u64)
}
