//! Lookups: `__P`, `__setProperty` and `__V`

use crate::arg;
use volley_core::{CompoundVariable, Function, FunctionDescriptor, FunctionError, ThreadContext};

/// `${__P(name[, default])}`: run-wide property, `1` when unset and no default is given
#[derive(Debug)]
pub struct Property {
    args: Vec<CompoundVariable>,
}

impl Property {
    pub const KEY: &'static str = "__P";

    pub fn descriptor() -> FunctionDescriptor {
        FunctionDescriptor::new(Self::KEY, "Value of a run property", |args| {
            Ok(Box::new(Property { args }))
        })
        .params(1, Some(2))
    }
}

impl Function for Property {
    fn execute(&self, ctx: &mut ThreadContext) -> Result<String, FunctionError> {
        let name = arg(&self.args, 0, ctx);
        if let Some(value) = ctx.properties().get(name.trim()) {
            return Ok(value);
        }
        if self.args.len() > 1 {
            Ok(arg(&self.args, 1, ctx))
        } else {
            Ok("1".to_string())
        }
    }
}

/// `${__setProperty(name, value[, return_previous])}`: sets a run-wide property.
///
/// Yields the previous value when the third argument is `true`, otherwise nothing.
#[derive(Debug)]
pub struct SetProperty {
    args: Vec<CompoundVariable>,
}

impl SetProperty {
    pub const KEY: &'static str = "__setProperty";

    pub fn descriptor() -> FunctionDescriptor {
        FunctionDescriptor::new(Self::KEY, "Set a run property", |args| {
            Ok(Box::new(SetProperty { args }))
        })
        .params(2, Some(3))
    }
}

impl Function for SetProperty {
    fn execute(&self, ctx: &mut ThreadContext) -> Result<String, FunctionError> {
        let name = arg(&self.args, 0, ctx).trim().to_string();
        let value = arg(&self.args, 1, ctx);
        let return_previous = arg(&self.args, 2, ctx).trim().eq_ignore_ascii_case("true");
        let previous = ctx.properties().set(name, value);
        if return_previous {
            Ok(previous.unwrap_or_default())
        } else {
            Ok(String::new())
        }
    }
}

/// `${__V(name[, default])}`: variable whose name is itself computed.
///
/// An unknown variable yields the default when given, else the name.
#[derive(Debug)]
pub struct VariableLookup {
    args: Vec<CompoundVariable>,
}

impl VariableLookup {
    pub const KEY: &'static str = "__V";

    pub fn descriptor() -> FunctionDescriptor {
        FunctionDescriptor::new(Self::KEY, "Variable with a computed name", |args| {
            Ok(Box::new(VariableLookup { args }))
        })
        .params(1, Some(2))
    }
}

impl Function for VariableLookup {
    fn execute(&self, ctx: &mut ThreadContext) -> Result<String, FunctionError> {
        let name = arg(&self.args, 0, ctx);
        if let Some(value) = ctx.variables.get(&name) {
            return Ok(value.to_string());
        }
        if self.args.len() > 1 {
            Ok(arg(&self.args, 1, ctx))
        } else {
            Ok(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::eval;
    use volley_core::{SharedProperties, ThreadContext};

    #[test]
    fn test_property_lookup() {
        let props: SharedProperties = [("host", "example.org")].into_iter().collect();
        let mut ctx = ThreadContext::default().with_properties(props);

        assert_eq!(eval("${__P(host)}", &mut ctx), "example.org");
        assert_eq!(eval("${__P(port,8080)}", &mut ctx), "8080");
        assert_eq!(eval("${__P(threads)}", &mut ctx), "1");
        assert_eq!(eval("${__P(threads,)}", &mut ctx), "");
    }

    #[test]
    fn test_set_property_is_shared() {
        let props = SharedProperties::new();
        let mut first = ThreadContext::default().with_properties(props.clone());
        let mut second = ThreadContext::default().with_properties(props);

        assert_eq!(eval("${__setProperty(token,abc)}", &mut first), "");
        assert_eq!(eval("${__P(token)}", &mut second), "abc");
        assert_eq!(eval("${__setProperty(token,def,true)}", &mut second), "abc");
        assert_eq!(eval("${__P(token)}", &mut first), "def");
    }

    #[test]
    fn test_computed_variable_name() {
        let mut ctx = ThreadContext::default();
        ctx.variables.put("idx", "2");
        ctx.variables.put("user_2", "bob");

        assert_eq!(eval("${__V(user_${idx})}", &mut ctx), "bob");
        assert_eq!(eval("${__V(user_9,nobody)}", &mut ctx), "nobody");
        assert_eq!(eval("${__V(user_9)}", &mut ctx), "user_9");
    }
}
