//! Explicit per-thread execution context

use crate::error::FunctionError;
use crate::sample::SampleResult;
use crate::script::ScriptEngine;
use crate::signal::ThreadSignal;
use crate::variables::Variables;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Global properties shared by every thread of a run
#[derive(Debug, Clone, Default)]
pub struct SharedProperties {
    inner: Arc<RwLock<BTreeMap<String, String>>>,
}

impl SharedProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.inner.read().get(name).cloned()
    }

    /// Sets a property, returning the previous value
    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.inner.write().insert(name.into(), value.into())
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.inner.read().clone()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SharedProperties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }
}

/// Who a context belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadIdentity {
    /// 1-based number within the thread group
    pub thread_num: usize,
    pub thread_name: String,
    pub group_name: String,
}

impl Default for ThreadIdentity {
    fn default() -> Self {
        Self {
            thread_num: 1,
            thread_name: "main".to_string(),
            group_name: String::new(),
        }
    }
}

/// Everything a sampler, controller or function may need from its thread.
///
/// Passed by `&mut` into every call that reads or mutates per-thread state;
/// nothing is looked up through globals or thread-locals.
pub struct ThreadContext {
    pub variables: Variables,
    identity: ThreadIdentity,
    previous_result: Option<SampleResult>,
    current_sampler: Option<String>,
    properties: SharedProperties,
    function_state: HashMap<u64, i64>,
    script_engine: Option<Box<dyn ScriptEngine>>,
    signal: Arc<ThreadSignal>,
}

impl ThreadContext {
    pub fn new(identity: ThreadIdentity) -> Self {
        Self {
            variables: Variables::new(),
            identity,
            previous_result: None,
            current_sampler: None,
            properties: SharedProperties::new(),
            function_state: HashMap::new(),
            script_engine: None,
            signal: Arc::new(ThreadSignal::new()),
        }
    }

    pub fn with_properties(mut self, properties: SharedProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_signal(mut self, signal: Arc<ThreadSignal>) -> Self {
        self.signal = signal;
        self
    }

    pub fn with_script_engine(mut self, engine: Box<dyn ScriptEngine>) -> Self {
        self.script_engine = Some(engine);
        self
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    pub fn identity(&self) -> &ThreadIdentity {
        &self.identity
    }

    pub fn thread_num(&self) -> usize {
        self.identity.thread_num
    }

    pub fn thread_name(&self) -> &str {
        &self.identity.thread_name
    }

    pub fn properties(&self) -> &SharedProperties {
        &self.properties
    }

    pub fn signal(&self) -> &Arc<ThreadSignal> {
        &self.signal
    }

    pub fn is_running(&self) -> bool {
        self.signal.is_running()
    }

    pub fn previous_result(&self) -> Option<&SampleResult> {
        self.previous_result.as_ref()
    }

    pub fn set_previous_result(&mut self, result: SampleResult) {
        self.previous_result = Some(result);
    }

    pub fn current_sampler(&self) -> Option<&str> {
        self.current_sampler.as_deref()
    }

    pub fn set_current_sampler(&mut self, name: Option<String>) {
        self.current_sampler = name;
    }

    /// Per-thread numeric state owned by one function instance
    pub fn function_state(&mut self, id: u64) -> &mut i64 {
        self.function_state.entry(id).or_insert(0)
    }

    /// Evaluates script source with the thread's script engine
    pub fn eval_script(&mut self, script: &str) -> Result<String, FunctionError> {
        let Self {
            script_engine,
            variables,
            ..
        } = self;
        match script_engine {
            Some(engine) => engine.eval(script, variables),
            None => Err(FunctionError::NoScriptEngine),
        }
    }
}

impl Default for ThreadContext {
    fn default() -> Self {
        Self::new(ThreadIdentity::default())
    }
}

impl std::fmt::Debug for ThreadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadContext")
            .field("identity", &self.identity)
            .field("variables", &self.variables.len())
            .field("has_script_engine", &self.script_engine.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl ScriptEngine for Echo {
        fn eval(&mut self, script: &str, variables: &Variables) -> Result<String, FunctionError> {
            Ok(variables.get(script).unwrap_or("undefined").to_string())
        }
    }

    #[test]
    fn test_shared_properties_are_shared() {
        let props = SharedProperties::new();
        let copy = props.clone();
        assert_eq!(props.set("a", "1"), None);
        assert_eq!(copy.get("a"), Some("1".to_string()));
        assert_eq!(copy.set("a", "2"), Some("1".to_string()));
    }

    #[test]
    fn test_eval_script_requires_engine() {
        let mut ctx = ThreadContext::default();
        assert_eq!(ctx.eval_script("x"), Err(FunctionError::NoScriptEngine));

        let mut ctx = ThreadContext::default().with_script_engine(Box::new(Echo));
        ctx.variables.put("x", "42");
        assert_eq!(ctx.eval_script("x").unwrap(), "42");
    }

    #[test]
    fn test_function_state_starts_at_zero() {
        let mut ctx = ThreadContext::default();
        *ctx.function_state(7) += 1;
        assert_eq!(*ctx.function_state(7), 1);
        assert_eq!(*ctx.function_state(8), 0);
    }
}
