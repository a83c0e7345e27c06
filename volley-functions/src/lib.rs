//! Built-in function library for Volley templates
//!
//! [`default_registry`] returns a registry holding every function in this
//! crate. Callers that want a smaller or larger set can build their own
//! [`FunctionRegistry`] from the individual descriptors.

pub mod counter;
pub mod extract;
pub mod files;
pub mod properties;
pub mod random;
pub mod sum;
pub mod time;

#[cfg(feature = "javascript")]
pub mod javascript;

use volley_core::{CompoundVariable, FunctionRegistry, ThreadContext};

#[cfg(feature = "javascript")]
pub use javascript::{BoaScriptEngine, BoaScriptEngineFactory};

/// Registry with all built-in functions
pub fn default_registry() -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    registry
        .register(counter::Counter::descriptor())
        .register(counter::ThreadNum::descriptor())
        .register(random::Random::descriptor())
        .register(random::RandomString::descriptor())
        .register(random::UuidFunction::descriptor())
        .register(extract::RegexFunction::descriptor())
        .register(sum::IntSum::descriptor())
        .register(time::Time::descriptor())
        .register(properties::Property::descriptor())
        .register(properties::SetProperty::descriptor())
        .register(properties::VariableLookup::descriptor())
        .register(files::StringFromFile::descriptor())
        .register(files::CsvRead::descriptor());

    #[cfg(feature = "javascript")]
    registry.register(javascript::JavaScript::descriptor());

    registry
}

/// Evaluates argument `index`, or an empty string when it was not given
pub(crate) fn arg(args: &[CompoundVariable], index: usize, ctx: &mut ThreadContext) -> String {
    args.get(index)
        .map(|a| a.execute(ctx))
        .unwrap_or_default()
}

/// Stores `value` under the variable named by argument `index`, if present and non-blank
pub(crate) fn store(args: &[CompoundVariable], index: usize, value: &str, ctx: &mut ThreadContext) {
    let name = arg(args, index, ctx);
    let name = name.trim();
    if !name.is_empty() {
        ctx.variables.put(name, value);
    }
}
