//! `__regexFunction`: regex extraction from the previous response

use crate::arg;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::{Captures, Regex};
use volley_core::{CompoundVariable, Function, FunctionDescriptor, FunctionError, ThreadContext, Variables};

static TEMPLATE_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$(\d+)\$").expect("valid regex"));

/// One piece of a `$n$` output template
#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Text(String),
    Group(usize),
}

fn parse_template(raw: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for caps in TEMPLATE_GROUP.captures_iter(raw) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        if whole.start > last {
            pieces.push(Piece::Text(raw[last..whole.start].to_string()));
        }
        match caps[1].parse() {
            Ok(group) => pieces.push(Piece::Group(group)),
            Err(_) => pieces.push(Piece::Text(caps[0].to_string())),
        }
        last = whole.end;
    }
    if last < raw.len() {
        pieces.push(Piece::Text(raw[last..].to_string()));
    }
    pieces
}

/// Which match to use
#[derive(Debug, Clone, Copy, PartialEq)]
enum Selector {
    All,
    Random,
    /// 1-based index
    Index(i64),
    /// Fraction of the match count
    Ratio(f32),
}

impl Selector {
    fn parse(raw: &str) -> Result<Self, FunctionError> {
        match raw.trim() {
            "" => Ok(Selector::Index(1)),
            "ALL" => Ok(Selector::All),
            "RAND" => Ok(Selector::Random),
            other => other
                .parse::<i64>()
                .map(Selector::Index)
                .or_else(|_| other.parse::<f32>().map(Selector::Ratio))
                .map_err(|_| {
                    FunctionError::failed(RegexFunction::KEY, format!("invalid match number '{other}'"))
                }),
        }
    }
}

/// `${__regexFunction(regex, template[, match[, between[, default[, var[, input_var]]]]])}`
///
/// Matches against the named input variable when given, otherwise against the
/// previous sample's response data. With an output variable, also sets
/// `var_gN` for each group of the chosen match and `var_matchNr` for the
/// number of matches.
#[derive(Debug)]
pub struct RegexFunction {
    args: Vec<CompoundVariable>,
}

impl RegexFunction {
    pub const KEY: &'static str = "__regexFunction";

    pub fn descriptor() -> FunctionDescriptor {
        FunctionDescriptor::new(Self::KEY, "Extract a value with a regular expression", |args| {
            Ok(Box::new(RegexFunction { args }))
        })
        .params(2, Some(7))
    }
}

fn render(caps: &Captures<'_>, template: &[Piece], var: &str, vars: &mut Variables) -> String {
    if !var.is_empty() {
        for (n, group) in caps.iter().enumerate() {
            let text = group.map_or("", |m| m.as_str());
            vars.put(format!("{var}_g{n}"), text);
        }
    }
    let mut out = String::new();
    for piece in template {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Group(n) => out.push_str(caps.get(*n).map_or("", |m| m.as_str())),
        }
    }
    if !var.is_empty() {
        vars.put(var, out.as_str());
    }
    out
}

impl Function for RegexFunction {
    fn execute(&self, ctx: &mut ThreadContext) -> Result<String, FunctionError> {
        let pattern = arg(&self.args, 0, ctx);
        let regex = Regex::new(&pattern)
            .map_err(|e| FunctionError::failed(Self::KEY, format!("malformed pattern '{pattern}': {e}")))?;
        let template = parse_template(&arg(&self.args, 1, ctx));
        let selector = Selector::parse(&arg(&self.args, 2, ctx))?;
        let between = arg(&self.args, 3, ctx);
        let default = arg(&self.args, 4, ctx);
        let var = arg(&self.args, 5, ctx).trim().to_string();
        let input_var = arg(&self.args, 6, ctx).trim().to_string();

        if !var.is_empty() {
            ctx.variables.put(var.as_str(), default.as_str());
        }

        let input = if !input_var.is_empty() {
            ctx.variables.get(&input_var).map(str::to_string)
        } else {
            ctx.previous_result().map(|r| r.response_data.clone())
        };
        let input = match input {
            Some(text) if !text.is_empty() => text,
            _ => return Ok(default),
        };

        let matches: Vec<Captures<'_>> = regex.captures_iter(&input).collect();
        if !var.is_empty() {
            ctx.variables.put(format!("{var}_matchNr"), matches.len().to_string());
        }
        if matches.is_empty() {
            return Ok(default);
        }

        let chosen = match selector {
            Selector::All => {
                let rendered: Vec<String> = matches
                    .iter()
                    .map(|caps| render(caps, &template, &var, &mut ctx.variables))
                    .collect();
                return Ok(rendered.join(&between));
            }
            Selector::Random => rand::rng().random_range(0..matches.len()),
            Selector::Index(n) if n >= 1 && (n as usize) <= matches.len() => n as usize - 1,
            Selector::Index(_) => return Ok(default),
            Selector::Ratio(ratio) => {
                let position = (matches.len() as f32 * ratio + 0.5) as i64 - 1;
                if position < 0 || position as usize >= matches.len() {
                    return Ok(default);
                }
                position as usize
            }
        };
        Ok(render(&matches[chosen], &template, &var, &mut ctx.variables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::eval;
    use volley_core::SampleResult;

    fn ctx_with_response(data: &str) -> ThreadContext {
        let mut ctx = ThreadContext::default();
        ctx.set_previous_result(SampleResult::new("prev").with_data(data));
        ctx
    }

    const PAGE: &str = "<company-xmlns><value field=\"1\">10</value><value field=\"2\">20</value>\
                        <value field=\"3\">30</value></company-xmlns>";

    #[test]
    fn test_template_parsing() {
        assert_eq!(
            parse_template("$1$,$2$"),
            vec![Piece::Group(1), Piece::Text(",".into()), Piece::Group(2)]
        );
        assert_eq!(parse_template("x$$y"), vec![Piece::Text("x$$y".into())]);
        assert_eq!(
            parse_template("a$0$"),
            vec![Piece::Text("a".into()), Piece::Group(0)]
        );
    }

    #[test]
    fn test_extracts_from_previous_response() {
        let mut ctx = ctx_with_response("<html>hello world</html>");
        assert_eq!(
            eval("${__regexFunction(<html>(.*)</html>,$1$)}", &mut ctx),
            "hello world"
        );
    }

    #[test]
    fn test_selects_match_and_sets_variables() {
        let mut ctx = ctx_with_response(PAGE);
        let out = eval(
            r#"${__regexFunction(<value field="(\d+)">(\d+)</value>,f$1$=$2$,2,,none,out)}"#,
            &mut ctx,
        );
        assert_eq!(out, "f2=20");
        assert_eq!(ctx.variables.get("out"), Some("f2=20"));
        assert_eq!(ctx.variables.get("out_matchNr"), Some("3"));
        assert_eq!(ctx.variables.get("out_g1"), Some("2"));
        assert_eq!(ctx.variables.get("out_g2"), Some("20"));
    }

    #[test]
    fn test_all_matches_joined() {
        let mut ctx = ctx_with_response(PAGE);
        let out = eval(
            r#"${__regexFunction(<value field="\d+">(\d+)</value>,$1$,ALL,-)}"#,
            &mut ctx,
        );
        assert_eq!(out, "10-20-30");
    }

    #[test]
    fn test_random_match_is_one_of_them() {
        let mut ctx = ctx_with_response(PAGE);
        let out = eval(
            r#"${__regexFunction(<value field="\d+">(\d+)</value>,$1$,RAND)}"#,
            &mut ctx,
        );
        assert!(["10", "20", "30"].contains(&out.as_str()));
    }

    #[test]
    fn test_ratio_selects_proportionally() {
        let mut ctx = ctx_with_response(PAGE);
        let out = eval(
            r#"${__regexFunction(<value field="\d+">(\d+)</value>,$1$,0.5)}"#,
            &mut ctx,
        );
        assert_eq!(out, "20");
    }

    #[test]
    fn test_default_when_out_of_range_or_no_match() {
        let mut ctx = ctx_with_response(PAGE);
        let out = eval(
            r#"${__regexFunction(<value field="\d+">(\d+)</value>,$1$,4,,fallback,v)}"#,
            &mut ctx,
        );
        assert_eq!(out, "fallback");
        assert_eq!(ctx.variables.get("v"), Some("fallback"));

        let out = eval("${__regexFunction(nomatch(\\d),$1$,1,,dflt,v)}", &mut ctx);
        assert_eq!(out, "dflt");
        assert_eq!(ctx.variables.get("v_matchNr"), Some("0"));

        let out = eval(
            r#"${__regexFunction(<value field="\d+">(\d+)</value>,$1$,0,,zero)}"#,
            &mut ctx,
        );
        assert_eq!(out, "zero");
    }

    #[test]
    fn test_input_variable_and_missing_input() {
        let mut ctx = ThreadContext::default();
        assert_eq!(eval("${__regexFunction(a(b),$1$,1,,empty)}", &mut ctx), "empty");

        ctx.variables.put("source", "xaby");
        assert_eq!(
            eval("${__regexFunction(a(b),[$1$],1,,empty,,source)}", &mut ctx),
            "[b]"
        );
    }

    #[test]
    fn test_malformed_pattern_yields_empty() {
        let mut ctx = ctx_with_response("abc");
        assert_eq!(eval("${__regexFunction([,$1$)}", &mut ctx), "");
    }
}
