//! Response assertion

use regex::Regex;
use volley_core::{
    Assertion, AssertionResult, ElementSpec, PropertySpec, SampleResult, TestElement,
    ThreadContext,
};

pub const TEST_FIELD: &str = "test_field";
pub const TEST_TYPE: &str = "test_type";
pub const PATTERN: &str = "pattern";
pub const NOT: &str = "not";

pub const RESPONSE_ASSERTION_SPEC: ElementSpec = ElementSpec {
    kind: "response_assertion",
    clonable: true,
    properties: &[
        PropertySpec::text(TEST_FIELD, "response_data"),
        PropertySpec::text(TEST_TYPE, "contains"),
        PropertySpec::text(PATTERN, ""),
        PropertySpec::bool(NOT, false),
    ],
};

/// Checks one field of the result against a pattern.
///
/// `test_type` is `contains` or `matches` (regular expressions, anywhere or
/// whole field), `substring` or `equals` (plain text).
#[derive(Debug, Default)]
pub struct ResponseAssertion;

impl Assertion for ResponseAssertion {
    fn check(
        &self,
        element: &TestElement,
        result: &SampleResult,
        ctx: &mut ThreadContext,
    ) -> AssertionResult {
        let name = element.label(ctx);
        let field = element.text(TEST_FIELD, ctx);
        let test_type = element.text(TEST_TYPE, ctx).to_ascii_lowercase();
        let pattern = element.text(PATTERN, ctx);
        let negate = element.bool(NOT, ctx);

        let value = match field.as_str() {
            "response_code" => &result.response_code,
            "response_message" => &result.response_message,
            "label" => &result.label,
            _ => &result.response_data,
        };
        let found = match test_type.as_str() {
            "matches" | "contains" => {
                let source = if test_type == "matches" {
                    format!("^(?:{})$", pattern)
                } else {
                    pattern.clone()
                };
                match Regex::new(&source) {
                    Ok(regex) => regex.is_match(value),
                    Err(e) => {
                        return AssertionResult::fail(name, format!("Invalid pattern: {}", e));
                    }
                }
            }
            "equals" => *value == pattern,
            _ => value.contains(pattern.as_str()),
        };

        if found != negate {
            return AssertionResult::pass(name);
        }
        let verb = if negate { "not to" } else { "to" };
        AssertionResult::fail(
            name,
            format!(
                "Test failed: {} expected {} {} /{}/",
                field, verb, test_type, pattern
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assertion(test_type: &str, pattern: &str) -> TestElement {
        RESPONSE_ASSERTION_SPEC
            .instantiate("check")
            .with(TEST_TYPE, test_type)
            .with(PATTERN, pattern)
    }

    #[test]
    fn test_types() {
        let mut ctx = ThreadContext::default();
        let result = SampleResult::new("s").with_data("status: ok 42");

        let check = |el: &TestElement, ctx: &mut ThreadContext| {
            ResponseAssertion.check(el, &result, ctx)
        };
        assert!(!check(&assertion("contains", r"ok \d+"), &mut ctx).failure);
        assert!(check(&assertion("matches", r"ok \d+"), &mut ctx).failure);
        assert!(!check(&assertion("matches", r"status: .*"), &mut ctx).failure);
        assert!(check(&assertion("substring", "(ok"), &mut ctx).failure);
        assert!(!check(&assertion("substring", "ok 4"), &mut ctx).failure);
        assert!(!check(&assertion("equals", "status: ok 42"), &mut ctx).failure);
    }

    #[test]
    fn test_negated_and_other_fields() {
        let mut ctx = ThreadContext::default();
        let result = SampleResult::new("s").with_response("500", "Server Error");
        let element = assertion("equals", "200").with(TEST_FIELD, "response_code");

        let outcome = ResponseAssertion.check(&element, &result, &mut ctx);
        assert!(outcome.failure);
        assert_eq!(outcome.message, "Test failed: response_code expected to equals /200/");

        let negated = element.with(NOT, true);
        assert!(!ResponseAssertion.check(&negated, &result, &mut ctx).failure);
    }

    #[test]
    fn test_invalid_pattern_fails() {
        let mut ctx = ThreadContext::default();
        let outcome =
            ResponseAssertion.check(&assertion("contains", "("), &SampleResult::new("s"), &mut ctx);
        assert!(outcome.failure);
        assert!(outcome.message.starts_with("Invalid pattern"));
    }
}
