//! JavaScript evaluation backed by boa
//!
//! Each evaluation runs in a fresh boa context with the thread's variables
//! exposed as a `vars` object. `vars.get(name)` returns `null` for unknown
//! names.

use crate::{arg, store};
use boa_engine::{Context as BoaContext, Source};
use std::collections::BTreeMap;
use tracing::debug;
use volley_core::{
    CompoundVariable, Function, FunctionDescriptor, FunctionError, ScriptEngine,
    ScriptEngineFactory, ThreadContext, Variables,
};

const VARS_PRELUDE: &str = "Object.defineProperty(vars, 'get', { \
     value: function (k) { return this[k] === undefined ? null : this[k]; }, \
     enumerable: false });";

/// Script engine evaluating JavaScript with boa
#[derive(Debug, Default)]
pub struct BoaScriptEngine;

impl BoaScriptEngine {
    pub fn new() -> Self {
        Self
    }

    fn install_vars(context: &mut BoaContext, variables: &Variables) -> Result<(), FunctionError> {
        let map: BTreeMap<&str, &str> = variables.iter().collect();
        let json = serde_json::to_string(&map).map_err(|e| FunctionError::Script(e.to_string()))?;
        // A JSON string is also a valid JavaScript string literal
        let literal =
            serde_json::to_string(&json).map_err(|e| FunctionError::Script(e.to_string()))?;
        let setup = format!("var vars = JSON.parse({literal}); {VARS_PRELUDE}");
        context
            .eval(Source::from_bytes(&setup))
            .map_err(|e| FunctionError::Script(e.to_string()))?;
        Ok(())
    }
}

impl ScriptEngine for BoaScriptEngine {
    fn eval(&mut self, script: &str, variables: &Variables) -> Result<String, FunctionError> {
        let mut context = BoaContext::default();
        Self::install_vars(&mut context, variables)?;

        let value = context
            .eval(Source::from_bytes(script))
            .map_err(|e| FunctionError::Script(e.to_string()))?;
        let rendered = value
            .to_string(&mut context)
            .map_err(|e| FunctionError::Script(e.to_string()))?
            .to_std_string_escaped();
        debug!(script, result = %rendered, "Evaluated script");
        Ok(rendered)
    }
}

/// Hands each virtual user its own [`BoaScriptEngine`]
#[derive(Debug, Default, Clone, Copy)]
pub struct BoaScriptEngineFactory;

impl ScriptEngineFactory for BoaScriptEngineFactory {
    fn create(&self) -> Box<dyn ScriptEngine> {
        Box::new(BoaScriptEngine::new())
    }
}

/// `${__javaScript(script[, var])}`: result of a JavaScript expression
#[derive(Debug)]
pub struct JavaScript {
    args: Vec<CompoundVariable>,
}

impl JavaScript {
    pub const KEY: &'static str = "__javaScript";

    pub fn descriptor() -> FunctionDescriptor {
        FunctionDescriptor::new(Self::KEY, "Evaluate JavaScript", |args| {
            Ok(Box::new(JavaScript { args }))
        })
        .params(1, Some(2))
    }
}

impl Function for JavaScript {
    fn execute(&self, ctx: &mut ThreadContext) -> Result<String, FunctionError> {
        let script = arg(&self.args, 0, ctx);
        let value = ctx.eval_script(&script)?;
        store(&self.args, 1, &value, ctx);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::eval;

    fn scripted() -> ThreadContext {
        ThreadContext::default().with_script_engine(BoaScriptEngineFactory.create())
    }

    #[test]
    fn test_engine_sees_variables() {
        let mut engine = BoaScriptEngine::new();
        let vars: Variables = [("count", "4"), ("name", "it's \"quoted\"")]
            .into_iter()
            .collect();

        assert_eq!(engine.eval("1 + 2", &vars).unwrap(), "3");
        assert_eq!(engine.eval("vars.get('count') * 2", &vars).unwrap(), "8");
        assert_eq!(engine.eval("vars.name", &vars).unwrap(), "it's \"quoted\"");
        assert_eq!(engine.eval("vars.get('nope') === null", &vars).unwrap(), "true");
    }

    #[test]
    fn test_engine_reports_errors() {
        let mut engine = BoaScriptEngine::new();
        let err = engine.eval("throw new Error('boom')", &Variables::new()).unwrap_err();
        assert!(matches!(err, FunctionError::Script(ref m) if m.contains("boom")));
        assert!(engine.eval("(", &Variables::new()).is_err());
    }

    #[test]
    fn test_function_stores_result() {
        let mut ctx = scripted();
        ctx.variables.put("a", "20");
        assert_eq!(eval("${__javaScript(vars.get('a') * 2 + 2,answer)}", &mut ctx), "42");
        assert_eq!(ctx.variables.get("answer"), Some("42"));
        assert_eq!(eval("${__javaScript('x'.length > 0)}", &mut ctx), "true");
    }

    #[test]
    fn test_function_without_engine_yields_empty() {
        let mut ctx = ThreadContext::default();
        assert_eq!(eval("${__javaScript(1+1)}", &mut ctx), "");
    }
}
