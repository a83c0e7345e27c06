//! Test elements and their revertible property maps

use crate::context::ThreadContext;
use crate::error::{ExprError, PropertyError};
use crate::expr::{CompoundVariable, ExpressionCompiler};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A typed property value
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// A compiled template, evaluated on every read
    Expr(Arc<CompoundVariable>),
    Element(Box<TestElement>),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// String form with templates evaluated against `ctx`
    pub fn evaluate(&self, ctx: &mut ThreadContext) -> String {
        match self {
            PropertyValue::Expr(expr) => expr.execute(ctx),
            PropertyValue::List(items) => items
                .iter()
                .map(|item| item.evaluate(ctx))
                .collect::<Vec<_>>()
                .join(","),
            other => other.raw(),
        }
    }

    /// String form without evaluation; templates render as their source
    pub fn raw(&self) -> String {
        match self {
            PropertyValue::Text(s) => s.clone(),
            PropertyValue::Int(i) => i.to_string(),
            PropertyValue::Float(f) => f.to_string(),
            PropertyValue::Bool(b) => b.to_string(),
            PropertyValue::Expr(expr) => expr.raw().to_string(),
            PropertyValue::Element(el) => el.name(),
            PropertyValue::List(items) => items
                .iter()
                .map(PropertyValue::raw)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    fn compile(&mut self, compiler: &ExpressionCompiler, errors: &mut Vec<ExprError>) {
        match self {
            PropertyValue::Text(source) if ExpressionCompiler::needs_compiling(source) => {
                match compiler.compile(source) {
                    // Permanent text collapses back, unless compiling it again would change it
                    Ok(expr) => match expr.permanent_text() {
                        Some(text)
                            if text == source.as_str()
                                || !ExpressionCompiler::needs_compiling(text) =>
                        {
                            *self = PropertyValue::Text(text.to_string())
                        }
                        _ => *self = PropertyValue::Expr(Arc::new(expr)),
                    },
                    Err(e) => errors.push(e),
                }
            }
            PropertyValue::Element(el) => errors.extend(el.compile(compiler)),
            PropertyValue::List(items) => {
                for item in items {
                    item.compile(compiler, errors);
                }
            }
            _ => {}
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(value.into())
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<TestElement> for PropertyValue {
    fn from(value: TestElement) -> Self {
        PropertyValue::Element(Box::new(value))
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(value: Vec<PropertyValue>) -> Self {
        PropertyValue::List(value)
    }
}

/// One property entry and its run-time history
#[derive(Debug, Clone)]
enum Slot {
    Permanent(PropertyValue),
    /// Added while running; dropped on recovery
    Temporary(PropertyValue),
    /// A permanent value changed or removed while running
    Overridden {
        original: PropertyValue,
        current: Option<PropertyValue>,
    },
}

impl Slot {
    fn current(&self) -> Option<&PropertyValue> {
        match self {
            Slot::Permanent(v) | Slot::Temporary(v) => Some(v),
            Slot::Overridden { current, .. } => current.as_ref(),
        }
    }
}

/// Property map whose changes made while running can be rolled back
#[derive(Debug, Clone, Default)]
pub struct PropertyMap {
    slots: BTreeMap<String, Slot>,
    running: bool,
}

impl PropertyMap {
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.slots.get(key).and_then(Slot::current)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        let key = key.into();
        let value = value.into();
        if !self.running {
            self.slots.insert(key, Slot::Permanent(value));
            return;
        }
        let slot = match self.slots.remove(&key) {
            Some(Slot::Permanent(original)) | Some(Slot::Overridden { original, .. }) => {
                Slot::Overridden {
                    original,
                    current: Some(value),
                }
            }
            Some(Slot::Temporary(_)) | None => Slot::Temporary(value),
        };
        self.slots.insert(key, slot);
    }

    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        if !self.running {
            return match self.slots.remove(key) {
                Some(Slot::Permanent(v)) | Some(Slot::Temporary(v)) => Some(v),
                Some(Slot::Overridden { current, .. }) => current,
                None => None,
            };
        }
        match self.slots.remove(key) {
            Some(Slot::Permanent(original)) => {
                self.slots.insert(
                    key.to_string(),
                    Slot::Overridden {
                        original: original.clone(),
                        current: None,
                    },
                );
                Some(original)
            }
            Some(Slot::Overridden { original, current }) => {
                self.slots.insert(
                    key.to_string(),
                    Slot::Overridden {
                        original,
                        current: None,
                    },
                );
                current
            }
            Some(Slot::Temporary(v)) => Some(v),
            None => None,
        }
    }

    /// Current entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.slots
            .iter()
            .filter_map(|(k, slot)| slot.current().map(|v| (k.as_str(), v)))
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Enter running mode: later changes become revertible
    pub fn begin_run(&mut self) {
        self.running = true;
    }

    /// Drop temporaries and restore overridden values, staying in running mode
    pub fn recover(&mut self) {
        self.slots.retain(|_, slot| !matches!(slot, Slot::Temporary(_)));
        for slot in self.slots.values_mut() {
            if let Slot::Overridden { original, .. } = slot {
                *slot = Slot::Permanent(original.clone());
            }
        }
    }

    /// Recover and leave running mode
    pub fn end_run(&mut self) {
        self.recover();
        self.running = false;
    }

    fn permanent_values_mut(&mut self) -> impl Iterator<Item = &mut PropertyValue> {
        self.slots.values_mut().filter_map(|slot| match slot {
            Slot::Permanent(v) => Some(v),
            _ => None,
        })
    }
}

/// A node of a test plan: a name, an enabled flag and properties
#[derive(Debug, Clone)]
pub struct TestElement {
    enabled: bool,
    properties: PropertyMap,
}

impl TestElement {
    pub const NAME: &'static str = "name";

    pub fn new(name: impl Into<String>) -> Self {
        let mut properties = PropertyMap::default();
        properties.set(Self::NAME, name.into());
        Self {
            enabled: true,
            properties,
        }
    }

    /// Builder-style property setter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set_property(key, value);
        self
    }

    /// Raw name, templates unevaluated
    pub fn name(&self) -> String {
        self.properties
            .get(Self::NAME)
            .map(PropertyValue::raw)
            .unwrap_or_default()
    }

    /// Name with templates evaluated, used as the sample label
    pub fn label(&self, ctx: &mut ThreadContext) -> String {
        self.text(Self::NAME, ctx)
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.properties.set(Self::NAME, name.into());
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.set(key, value);
    }

    pub fn remove_property(&mut self, key: &str) -> Option<PropertyValue> {
        self.properties.remove(key)
    }

    /// Evaluated string value; missing properties read as empty
    pub fn text(&self, key: &str, ctx: &mut ThreadContext) -> String {
        self.property(key)
            .map(|v| v.evaluate(ctx))
            .unwrap_or_default()
    }

    pub fn int(&self, key: &str, ctx: &mut ThreadContext) -> Result<i64, PropertyError> {
        match self.property(key) {
            None => Err(PropertyError::Missing(key.to_string())),
            Some(PropertyValue::Int(i)) => Ok(*i),
            Some(PropertyValue::Float(f)) => Ok(*f as i64),
            Some(other) => {
                let text = other.evaluate(ctx);
                text.trim().parse().map_err(|_| PropertyError::Type {
                    name: key.to_string(),
                    expected: "integer",
                    value: text,
                })
            }
        }
    }

    /// Integer value, falling back to `default` when missing or unparsable
    pub fn int_or(&self, key: &str, default: i64, ctx: &mut ThreadContext) -> i64 {
        match self.int(key, ctx) {
            Ok(v) => v,
            Err(PropertyError::Missing(_)) => default,
            Err(e) => {
                tracing::warn!(element = %self.name(), "{}, using {}", e, default);
                default
            }
        }
    }

    pub fn float(&self, key: &str, ctx: &mut ThreadContext) -> Result<f64, PropertyError> {
        match self.property(key) {
            None => Err(PropertyError::Missing(key.to_string())),
            Some(PropertyValue::Float(f)) => Ok(*f),
            Some(PropertyValue::Int(i)) => Ok(*i as f64),
            Some(other) => {
                let text = other.evaluate(ctx);
                text.trim().parse().map_err(|_| PropertyError::Type {
                    name: key.to_string(),
                    expected: "number",
                    value: text,
                })
            }
        }
    }

    /// Boolean value; only a case-insensitive `true` is true
    pub fn bool(&self, key: &str, ctx: &mut ThreadContext) -> bool {
        match self.property(key) {
            None => false,
            Some(PropertyValue::Bool(b)) => *b,
            Some(other) => other.evaluate(ctx).trim().eq_ignore_ascii_case("true"),
        }
    }

    pub fn list(&self, key: &str) -> &[PropertyValue] {
        match self.property(key) {
            Some(PropertyValue::List(items)) => items,
            _ => &[],
        }
    }

    pub fn begin_run(&mut self) {
        self.properties.begin_run();
    }

    /// Restore the pre-run property set, staying in running mode
    pub fn recover_running_version(&mut self) {
        self.properties.recover();
    }

    pub fn end_run(&mut self) {
        self.properties.end_run();
    }

    pub fn is_running_version(&self) -> bool {
        self.properties.is_running()
    }

    /// Compiles every templated text property, returning the parse errors.
    ///
    /// Already compiled values are left alone, so compiling twice is harmless.
    pub fn compile(&mut self, compiler: &ExpressionCompiler) -> Vec<ExprError> {
        let mut errors = Vec::new();
        for value in self.properties.permanent_values_mut() {
            value.compile(compiler, &mut errors);
        }
        errors
    }
}
