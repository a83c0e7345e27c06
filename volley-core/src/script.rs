//! Script evaluation seam used by conditions and script functions

use crate::error::FunctionError;
use crate::variables::Variables;

/// Evaluates script source with read access to the thread's variables.
///
/// Instances live inside one thread's context, so they need not be `Send`.
pub trait ScriptEngine {
    fn eval(&mut self, script: &str, variables: &Variables) -> Result<String, FunctionError>;
}

/// Creates one script engine per virtual-user thread
pub trait ScriptEngineFactory: Send + Sync {
    fn create(&self) -> Box<dyn ScriptEngine>;
}
