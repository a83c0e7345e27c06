//! Declarative property schemas for element kinds

use crate::element::{PropertyValue, TestElement};

/// Declared type of an element property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Text,
    Int,
    Float,
    Bool,
    List,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Text => "text",
            PropertyType::Int => "integer",
            PropertyType::Float => "number",
            PropertyType::Bool => "boolean",
            PropertyType::List => "list",
        }
    }
}

/// Default applied when a property is not set
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    None,
    Text(&'static str),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl DefaultValue {
    fn to_value(self) -> Option<PropertyValue> {
        match self {
            DefaultValue::None => None,
            DefaultValue::Text(s) => Some(PropertyValue::Text(s.to_string())),
            DefaultValue::Int(i) => Some(PropertyValue::Int(i)),
            DefaultValue::Float(f) => Some(PropertyValue::Float(f)),
            DefaultValue::Bool(b) => Some(PropertyValue::Bool(b)),
        }
    }
}

/// `(name, type, default)` for one property
#[derive(Debug, Clone, Copy)]
pub struct PropertySpec {
    pub name: &'static str,
    pub kind: PropertyType,
    pub default: DefaultValue,
}

impl PropertySpec {
    pub const fn text(name: &'static str, default: &'static str) -> Self {
        Self {
            name,
            kind: PropertyType::Text,
            default: DefaultValue::Text(default),
        }
    }

    pub const fn int(name: &'static str, default: i64) -> Self {
        Self {
            name,
            kind: PropertyType::Int,
            default: DefaultValue::Int(default),
        }
    }

    pub const fn float(name: &'static str, default: f64) -> Self {
        Self {
            name,
            kind: PropertyType::Float,
            default: DefaultValue::Float(default),
        }
    }

    pub const fn bool(name: &'static str, default: bool) -> Self {
        Self {
            name,
            kind: PropertyType::Bool,
            default: DefaultValue::Bool(default),
        }
    }

    pub const fn list(name: &'static str) -> Self {
        Self {
            name,
            kind: PropertyType::List,
            default: DefaultValue::None,
        }
    }
}

/// Schema of one element kind.
///
/// `clonable` is false for elements shared by every thread instead of being
/// copied into each thread's tree.
#[derive(Debug)]
pub struct ElementSpec {
    pub kind: &'static str,
    pub clonable: bool,
    pub properties: &'static [PropertySpec],
}

impl ElementSpec {
    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Sets every declared default the element does not define yet
    pub fn apply_defaults(&self, element: &mut TestElement) {
        for spec in self.properties {
            if element.property(spec.name).is_none() {
                if let Some(value) = spec.default.to_value() {
                    element.set_property(spec.name, value);
                }
            }
        }
    }

    /// A fresh element of this kind with defaults applied
    pub fn instantiate(&self, name: impl Into<String>) -> TestElement {
        let mut element = TestElement::new(name);
        self.apply_defaults(&mut element);
        element
    }
}
