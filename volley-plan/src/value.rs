//! Conversion of YAML values into typed properties

use crate::error::{PlanError, Result};
use serde_yaml::Value;
use volley_core::{PropertySpec, PropertyType, PropertyValue, TestElement};

/// Short description of a YAML value for error messages
fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("text '{}'", s),
        Value::Sequence(_) => "a list".to_string(),
        Value::Mapping(_) => "a mapping".to_string(),
        Value::Tagged(t) => format!("tagged value {}", t.tag),
    }
}

/// Scalar rendered as text; numbers and booleans keep their YAML spelling
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

/// Converts `value` for property `spec` of element type `kind`.
///
/// Text is accepted for every scalar type so that templates can supply the
/// value at run time.
pub(crate) fn convert(kind: &str, spec: &PropertySpec, value: &Value) -> Result<PropertyValue> {
    let mismatch = || PlanError::PropertyType {
        kind: kind.to_string(),
        property: spec.name.to_string(),
        expected: spec.kind.as_str(),
        found: describe(value),
    };

    match (spec.kind, value) {
        (_, Value::String(s)) if spec.kind != PropertyType::List => {
            Ok(PropertyValue::Text(s.clone()))
        }
        (PropertyType::Text, other) => scalar_text(other).map(PropertyValue::Text).ok_or_else(mismatch),
        (PropertyType::Int, Value::Number(n)) => n.as_i64().map(PropertyValue::Int).ok_or_else(mismatch),
        (PropertyType::Float, Value::Number(n)) => {
            n.as_f64().map(PropertyValue::Float).ok_or_else(mismatch)
        }
        (PropertyType::Bool, Value::Bool(b)) => Ok(PropertyValue::Bool(*b)),
        (PropertyType::List, Value::Sequence(items)) => items
            .iter()
            .map(|item| list_item(item).ok_or_else(mismatch))
            .collect::<Result<Vec<_>>>()
            .map(PropertyValue::List),
        (PropertyType::List, Value::Mapping(entries)) => entries
            .iter()
            .map(|(key, item)| match (scalar_text(key), scalar_text(item)) {
                (Some(name), Some(text)) => Ok(named_entry(name, text)),
                _ => Err(mismatch()),
            })
            .collect::<Result<Vec<_>>>()
            .map(PropertyValue::List),
        _ => Err(mismatch()),
    }
}

/// `{ name: value }` entry of a list property
pub(crate) fn named_entry(name: String, value: String) -> PropertyValue {
    PropertyValue::Element(Box::new(TestElement::new(name).with("value", value)))
}

fn list_item(item: &Value) -> Option<PropertyValue> {
    if let Value::Mapping(entry) = item {
        let name = entry.get("name").and_then(scalar_text)?;
        let value = entry.get("value").and_then(scalar_text).unwrap_or_default();
        return Some(named_entry(name, value));
    }
    scalar_text(item).map(PropertyValue::Text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(source: &str) -> Value {
        serde_yaml::from_str(source).unwrap()
    }

    #[test]
    fn test_scalars_follow_declared_type() {
        let int = PropertySpec::int("num_threads", 1);
        assert!(matches!(convert("g", &int, &yaml("4")).unwrap(), PropertyValue::Int(4)));
        assert!(matches!(
            convert("g", &int, &yaml("'${threads}'")).unwrap(),
            PropertyValue::Text(ref s) if s == "${threads}"
        ));
        assert!(matches!(
            convert("g", &int, &yaml("2.5")),
            Err(PlanError::PropertyType { expected: "integer", .. })
        ));

        let text = PropertySpec::text("loops", "1");
        assert!(matches!(
            convert("g", &text, &yaml("3")).unwrap(),
            PropertyValue::Text(ref s) if s == "3"
        ));
        assert!(convert("g", &text, &yaml("[1]")).is_err());

        let flag = PropertySpec::bool("scheduler", false);
        assert!(matches!(convert("g", &flag, &yaml("true")).unwrap(), PropertyValue::Bool(true)));
        assert!(convert("g", &flag, &yaml("1")).is_err());
    }

    #[test]
    fn test_lists_accept_mappings_and_sequences() {
        let list = PropertySpec::list("variables");
        let PropertyValue::List(items) = convert("v", &list, &yaml("{a: 1, b: x}")).unwrap() else {
            panic!("expected a list");
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], PropertyValue::Element(el) if el.name() == "a"));

        let PropertyValue::List(items) =
            convert("v", &list, &yaml("[{name: c, value: 3}, plain]")).unwrap()
        else {
            panic!("expected a list");
        };
        assert!(matches!(&items[1], PropertyValue::Text(s) if s == "plain"));
        assert!(convert("v", &list, &yaml("text")).is_err());
    }
}
