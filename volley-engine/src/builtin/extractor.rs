//! Regular-expression extractor post-processor

use parking_lot::Mutex;
use rand::Rng;
use regex::{Captures, Regex};
use std::collections::HashMap;
use tracing::warn;
use volley_core::{
    ElementSpec, PostProcessor, PropertySpec, SampleResult, TestElement, ThreadContext,
};

pub const REF_NAME: &str = "ref_name";
pub const REGEX: &str = "regex";
pub const TEMPLATE: &str = "template";
pub const MATCH_NUMBER: &str = "match_number";
pub const DEFAULT: &str = "default";
pub const FIELD: &str = "field";

pub const REGEX_EXTRACTOR_SPEC: ElementSpec = ElementSpec {
    kind: "regex_extractor",
    clonable: true,
    properties: &[
        PropertySpec::text(REF_NAME, ""),
        PropertySpec::text(REGEX, ""),
        PropertySpec::text(TEMPLATE, "$1$"),
        PropertySpec::text(MATCH_NUMBER, "1"),
        PropertySpec::text(DEFAULT, ""),
        PropertySpec::text(FIELD, "body"),
    ],
};

/// Extracts values from the sample into `ref_name` variables.
///
/// `match_number` selects the match: `n > 0` the n-th, `0` a random one,
/// negative all of them as `ref_1..ref_N` with `ref_matchNr = N`.
#[derive(Debug, Default)]
pub struct RegexExtractor {
    cache: Mutex<HashMap<String, Regex>>,
}

impl RegexExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    fn regex(&self, pattern: &str) -> Result<Regex, regex::Error> {
        let mut cache = self.cache.lock();
        if let Some(regex) = cache.get(pattern) {
            return Ok(regex.clone());
        }
        let regex = Regex::new(pattern)?;
        cache.insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

impl PostProcessor for RegexExtractor {
    fn process(&self, element: &TestElement, result: &SampleResult, ctx: &mut ThreadContext) {
        let ref_name = element.text(REF_NAME, ctx);
        if ref_name.trim().is_empty() {
            warn!(extractor = %element.name(), "No reference name set");
            return;
        }
        let default = element.text(DEFAULT, ctx);
        ctx.variables.put(ref_name.as_str(), default);

        let pattern = element.text(REGEX, ctx);
        let regex = match self.regex(&pattern) {
            Ok(regex) => regex,
            Err(e) => {
                warn!(extractor = %element.name(), "Invalid regex '{}': {}", pattern, e);
                return;
            }
        };
        let input = match element.text(FIELD, ctx).as_str() {
            "code" => &result.response_code,
            "message" => &result.response_message,
            _ => &result.response_data,
        };
        let template = element.text(TEMPLATE, ctx);
        let match_number = element.int_or(MATCH_NUMBER, 1, ctx);
        let matches: Vec<Captures<'_>> = regex.captures_iter(input).collect();

        if match_number < 0 {
            clear_previous(ctx, &ref_name);
            ctx.variables
                .put(format!("{}_matchNr", ref_name), matches.len().to_string());
            for (i, caps) in matches.iter().enumerate() {
                let prefix = format!("{}_{}", ref_name, i + 1);
                ctx.variables.put(prefix.as_str(), render(&template, caps));
                put_groups(ctx, &prefix, caps);
            }
            return;
        }

        let chosen = if match_number == 0 {
            (!matches.is_empty()).then(|| rand::rng().random_range(0..matches.len()))
        } else {
            usize::try_from(match_number - 1)
                .ok()
                .filter(|i| *i < matches.len())
        };
        if let Some(caps) = chosen.map(|i| &matches[i]) {
            ctx.variables.put(ref_name.as_str(), render(&template, caps));
            put_groups(ctx, &ref_name, caps);
        }
    }
}

/// Removes the `ref_N` variables of an earlier all-matches extraction
fn clear_previous(ctx: &mut ThreadContext, ref_name: &str) {
    let key = format!("{}_matchNr", ref_name);
    let previous = ctx
        .variables
        .get(&key)
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(0);
    for i in 1..=previous {
        ctx.variables.remove(&format!("{}_{}", ref_name, i));
    }
}

fn put_groups(ctx: &mut ThreadContext, prefix: &str, caps: &Captures<'_>) {
    ctx.variables
        .put(format!("{}_g", prefix), (caps.len() - 1).to_string());
    for (g, group) in caps.iter().enumerate() {
        let value = group.map(|m| m.as_str()).unwrap_or_default();
        ctx.variables.put(format!("{}_g{}", prefix, g), value);
    }
}

/// Expands `$n$` references to capture groups; other text is copied
fn render(template: &str, caps: &Captures<'_>) -> String {
    let mut out = String::new();
    let mut rest = template;
    while let Some(start) = rest.find('$') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let digits = after.chars().take_while(char::is_ascii_digit).count();
        if digits > 0 && after[digits..].starts_with('$') {
            let group: usize = after[..digits].parse().unwrap_or(0);
            if let Some(m) = caps.get(group) {
                out.push_str(m.as_str());
            }
            rest = &after[digits + 1..];
        } else {
            out.push('$');
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor(regex: &str, match_number: &str) -> TestElement {
        REGEX_EXTRACTOR_SPEC
            .instantiate("extract")
            .with(REF_NAME, "token")
            .with(REGEX, regex)
            .with(MATCH_NUMBER, match_number)
            .with(DEFAULT, "NOT_FOUND")
    }

    fn response(body: &str) -> SampleResult {
        SampleResult::new("page").with_data(body)
    }

    #[test]
    fn test_first_match_and_groups() {
        let mut ctx = ThreadContext::default();
        let element = extractor(r"id=(\d+)&name=(\w+)", "1").with(TEMPLATE, "$2$-$1$");

        RegexExtractor::new().process(&element, &response("id=7&name=ann id=8&name=bob"), &mut ctx);
        assert_eq!(ctx.variables.get("token"), Some("ann-7"));
        assert_eq!(ctx.variables.get("token_g"), Some("2"));
        assert_eq!(ctx.variables.get("token_g0"), Some("id=7&name=ann"));
        assert_eq!(ctx.variables.get("token_g2"), Some("ann"));
    }

    #[test]
    fn test_all_matches() {
        let mut ctx = ThreadContext::default();
        let processor = RegexExtractor::new();
        processor.process(&extractor(r"v(\d)", "-1"), &response("v1 v2 v3"), &mut ctx);
        assert_eq!(ctx.variables.get("token_matchNr"), Some("3"));
        assert_eq!(ctx.variables.get("token_3"), Some("3"));

        processor.process(&extractor(r"v(\d)", "-1"), &response("v9"), &mut ctx);
        assert_eq!(ctx.variables.get("token_matchNr"), Some("1"));
        assert_eq!(ctx.variables.get("token_1"), Some("9"));
        assert_eq!(ctx.variables.get("token_3"), None);
    }

    #[test]
    fn test_missing_match_leaves_default() {
        let mut ctx = ThreadContext::default();
        let processor = RegexExtractor::new();
        processor.process(&extractor(r"v(\d)", "5"), &response("v1 v2"), &mut ctx);
        assert_eq!(ctx.variables.get("token"), Some("NOT_FOUND"));

        processor.process(&extractor(r"v(\d)", "0"), &response("v4"), &mut ctx);
        assert_eq!(ctx.variables.get("token"), Some("4"));

        processor.process(&extractor(r"v(", "1"), &response("v4"), &mut ctx);
        assert_eq!(ctx.variables.get("token"), Some("NOT_FOUND"));
    }

    #[test]
    fn test_render_keeps_stray_dollars() {
        let caps = Regex::new(r"(a)(b)").unwrap().captures("ab").unwrap();
        assert_eq!(render("$1$$2$", &caps), "ab");
        assert_eq!(render("cost: $5 $x$ $9$", &caps), "cost: $5 $x$ ");
    }
}
