//! Sampler that dumps the thread's variables and the shared properties

use volley_core::{ElementSpec, PropertySpec, SampleResult, Sampler, TestElement, ThreadContext};

pub const DISPLAY_VARIABLES: &str = "display_variables";
pub const DISPLAY_PROPERTIES: &str = "display_properties";

pub const DEBUG_SAMPLER_SPEC: ElementSpec = ElementSpec {
    kind: "debug_sampler",
    clonable: true,
    properties: &[
        PropertySpec::bool(DISPLAY_VARIABLES, true),
        PropertySpec::bool(DISPLAY_PROPERTIES, false),
    ],
};

#[derive(Debug, Default)]
pub struct DebugSampler;

impl Sampler for DebugSampler {
    fn sample(&self, element: &TestElement, ctx: &mut ThreadContext) -> SampleResult {
        let label = element.label(ctx);
        let show_variables = element.bool(DISPLAY_VARIABLES, ctx);
        let show_properties = element.bool(DISPLAY_PROPERTIES, ctx);

        SampleResult::timed(label, |result| {
            let mut out = String::new();
            if show_variables {
                out.push_str("Variables:\n");
                for (key, value) in ctx.variables.sorted() {
                    out.push_str(&format!("{}={}\n", key, value));
                }
            }
            if show_properties {
                out.push_str("Properties:\n");
                for (key, value) in ctx.properties().snapshot() {
                    out.push_str(&format!("{}={}\n", key, value));
                }
            }
            result.response_code = "200".to_string();
            result.response_message = "OK".to_string();
            result.response_data = out;
        })
    }
}
