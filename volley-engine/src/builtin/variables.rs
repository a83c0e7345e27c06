//! User defined variables

use volley_core::{
    ConfigElement, ElementSpec, PropertySpec, PropertyValue, TestElement, ThreadContext,
};

pub const VARIABLES: &str = "variables";
pub const VALUE: &str = "value";

pub const USER_VARIABLES_SPEC: ElementSpec = ElementSpec {
    kind: "user_defined_variables",
    clonable: true,
    properties: &[PropertySpec::list(VARIABLES)],
};

/// Sets variables when a thread starts.
///
/// `variables` holds one element per variable, named after it, with the
/// template in `value`. Entries are evaluated in order, so a value may
/// refer to the variables defined before it.
#[derive(Debug, Default)]
pub struct UserDefinedVariables;

impl UserDefinedVariables {
    /// The `variables` list entry for `name`
    pub fn entry(name: &str, value: impl Into<PropertyValue>) -> PropertyValue {
        PropertyValue::Element(Box::new(TestElement::new(name).with(VALUE, value)))
    }
}

impl ConfigElement for UserDefinedVariables {
    fn configure_thread(&self, element: &TestElement, ctx: &mut ThreadContext) {
        for entry in element.list(VARIABLES) {
            if let PropertyValue::Element(var) = entry {
                let value = var.text(VALUE, ctx);
                ctx.variables.put(var.name(), value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use volley_core::ExpressionCompiler;

    #[test]
    fn test_values_see_earlier_entries() {
        let compiler = ExpressionCompiler::new(Arc::new(volley_functions::default_registry()));
        let mut element = USER_VARIABLES_SPEC.instantiate("vars").with(
            VARIABLES,
            vec![
                UserDefinedVariables::entry("host", "example.org"),
                UserDefinedVariables::entry("url", "https://${host}/${__threadNum}"),
            ],
        );
        assert!(element.compile(&compiler).is_empty());

        let mut ctx = ThreadContext::default();
        UserDefinedVariables.configure_thread(&element, &mut ctx);
        assert_eq!(ctx.variables.get("host"), Some("example.org"));
        assert!(ctx.variables.get("url").unwrap().starts_with("https://example.org/"));
    }
}
