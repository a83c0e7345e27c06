//! Core model for Volley
//!
//! This crate holds the types every other Volley crate speaks: test elements
//! with revertible properties, the per-thread variable store and context, the
//! `${...}` expression compiler, sample results and the capability traits
//! implemented by samplers, listeners and processors.

pub mod component;
pub mod context;
pub mod element;
pub mod error;
pub mod expr;
pub mod sample;
pub mod schema;
pub mod script;
pub mod signal;
pub mod variables;

// Re-export commonly used types at the crate root
pub use component::{
    Assertion, AssertionResult, ConfigElement, Listener, PostProcessor, SampleEvent, Sampler,
    Timer,
};
pub use context::{SharedProperties, ThreadContext, ThreadIdentity};
pub use element::{PropertyMap, PropertyValue, TestElement};
pub use error::{ExprError, FunctionError, PropertyError, Result, VolleyError};
pub use expr::{
    CompoundVariable, ExpressionCompiler, Function, FunctionDescriptor, FunctionRegistry,
};
pub use sample::SampleResult;
pub use schema::{DefaultValue, ElementSpec, PropertySpec, PropertyType};
pub use script::{ScriptEngine, ScriptEngineFactory};
pub use signal::ThreadSignal;
pub use variables::{Variables, LAST_SAMPLE_OK};
