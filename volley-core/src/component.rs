//! Capabilities test elements can provide to a run
//!
//! Behaviour objects are stateless with respect to a thread: they read their
//! configuration from the [`TestElement`] handed to them and per-thread state
//! from the [`ThreadContext`]. One instance serves every thread.

use crate::context::ThreadContext;
use crate::element::TestElement;
use crate::error::Result;
use crate::sample::SampleResult;
use std::fmt;
use std::time::Duration;

/// A leaf element that performs one unit of work
pub trait Sampler: Send + Sync + fmt::Debug {
    fn sample(&self, element: &TestElement, ctx: &mut ThreadContext) -> SampleResult;
}

/// A result delivered to listeners
#[derive(Debug, Clone, Copy)]
pub struct SampleEvent<'a> {
    pub result: &'a SampleResult,
    pub thread_group: &'a str,
    pub thread_name: &'a str,
}

/// Receives run lifecycle notifications and sample results.
///
/// Listeners are shared by all threads and must tolerate concurrent calls.
pub trait Listener: Send + Sync + fmt::Debug {
    fn test_started(&self, _element: &TestElement) -> Result<()> {
        Ok(())
    }

    fn test_ended(&self, _element: &TestElement) -> Result<()> {
        Ok(())
    }

    fn iteration_started(&self, _element: &TestElement, _thread_name: &str, _iteration: u64) {}

    fn sample_occurred(&self, element: &TestElement, event: &SampleEvent<'_>);
}

/// Runs after a sample, typically extracting values into variables
pub trait PostProcessor: Send + Sync + fmt::Debug {
    fn process(&self, element: &TestElement, result: &SampleResult, ctx: &mut ThreadContext);
}

/// Outcome of one assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResult {
    pub name: String,
    pub failure: bool,
    pub message: String,
}

impl AssertionResult {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure: false,
            message: String::new(),
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure: true,
            message: message.into(),
        }
    }
}

/// Checks a sample result
pub trait Assertion: Send + Sync + fmt::Debug {
    fn check(&self, element: &TestElement, result: &SampleResult, ctx: &mut ThreadContext)
        -> AssertionResult;
}

/// Delay applied before each sampler in scope
pub trait Timer: Send + Sync + fmt::Debug {
    fn delay(&self, element: &TestElement, ctx: &mut ThreadContext) -> Duration;
}

/// Configures a thread before its first iteration
pub trait ConfigElement: Send + Sync + fmt::Debug {
    fn configure_thread(&self, element: &TestElement, ctx: &mut ThreadContext);
}
