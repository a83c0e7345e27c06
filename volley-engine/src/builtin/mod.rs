//! Built-in components for exercising plans without protocol samplers

pub mod assertion;
pub mod debug;
pub mod dummy;
pub mod extractor;
pub mod listener;
pub mod timer;
pub mod variables;

pub use assertion::{ResponseAssertion, RESPONSE_ASSERTION_SPEC};
pub use debug::{DebugSampler, DEBUG_SAMPLER_SPEC};
pub use dummy::{DummySampler, DUMMY_SAMPLER_SPEC};
pub use extractor::{RegexExtractor, REGEX_EXTRACTOR_SPEC};
pub use listener::{
    CollectedSample, CollectingListener, LabelSummary, SummaryListener, SUMMARY_LISTENER_SPEC,
};
pub use timer::{
    ConstantThroughputTimer, ConstantTimer, UniformRandomTimer, CONSTANT_THROUGHPUT_TIMER_SPEC,
    CONSTANT_TIMER_SPEC, UNIFORM_RANDOM_TIMER_SPEC,
};
pub use variables::{UserDefinedVariables, USER_VARIABLES_SPEC};
