//! Sampler producing a configurable response

use std::time::Duration;
use volley_core::{ElementSpec, PropertySpec, SampleResult, Sampler, TestElement, ThreadContext};

pub const SUCCESS: &str = "success";
pub const RESPONSE_CODE: &str = "response_code";
pub const RESPONSE_MESSAGE: &str = "response_message";
pub const RESPONSE_DATA: &str = "response_data";
pub const LATENCY_MS: &str = "latency_ms";

pub const DUMMY_SAMPLER_SPEC: ElementSpec = ElementSpec {
    kind: "dummy_sampler",
    clonable: true,
    properties: &[
        PropertySpec::text(SUCCESS, "true"),
        PropertySpec::text(RESPONSE_CODE, "200"),
        PropertySpec::text(RESPONSE_MESSAGE, "OK"),
        PropertySpec::text(RESPONSE_DATA, ""),
        PropertySpec::text(LATENCY_MS, "0"),
    ],
};

/// Returns the configured outcome after blocking for `latency_ms`.
///
/// The wait ends early when the thread is interrupted, in which case the
/// sample fails.
#[derive(Debug, Default)]
pub struct DummySampler;

impl Sampler for DummySampler {
    fn sample(&self, element: &TestElement, ctx: &mut ThreadContext) -> SampleResult {
        let label = element.label(ctx);
        let success = element.bool(SUCCESS, ctx);
        let code = element.text(RESPONSE_CODE, ctx);
        let message = element.text(RESPONSE_MESSAGE, ctx);
        let data = element.text(RESPONSE_DATA, ctx);
        let latency = element.int_or(LATENCY_MS, 0, ctx).max(0) as u64;
        let signal = ctx.signal().clone();

        SampleResult::timed(label, |result| {
            if latency > 0 && !signal.block_for(Duration::from_millis(latency)) {
                result.success = false;
                result.response_message = "Interrupted".to_string();
                return;
            }
            result.success = success;
            result.response_code = code;
            result.response_message = message;
            result.response_data = data;
        })
    }
}
