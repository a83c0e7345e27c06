//! Test orchestration for Volley
//!
//! The [`Engine`] takes a configured [`TestTree`](volley_control::TestTree),
//! starts the threads of each thread group with their ramp-up and scheduler
//! timing and runs the setup, main and teardown phases in order. Each thread
//! walks its own materialized copy of its group and feeds results through
//! timers, post-processors, assertions and listeners.
//!
//! [`builtin`] carries the components needed to run plans without protocol
//! samplers.

pub mod builtin;
pub mod engine;
pub mod error;
pub mod group;
pub mod registry;
mod thread;
mod transaction;

// Re-export commonly used types at the crate root
pub use engine::{Engine, EngineHandle, EngineSettings, RunReport};
pub use error::{EngineError, Result};
pub use group::{group_spec, GroupSettings, OnError, TEST_PLAN_SPEC};
pub use registry::{ThreadKey, ThreadRegistry};
