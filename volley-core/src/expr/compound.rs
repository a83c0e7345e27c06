use super::Function;
use crate::context::ThreadContext;
use std::sync::Arc;
use tracing::warn;

/// One piece of a compiled template
#[derive(Debug, Clone)]
pub(crate) enum Component {
    Literal(String),
    Variable(String),
    Function {
        name: String,
        function: Arc<dyn Function>,
    },
}

/// A compiled `${...}` template.
///
/// Templates made only of literal text are permanent: their value is
/// computed once at compile time and returned as is.
#[derive(Debug, Clone)]
pub struct CompoundVariable {
    raw: String,
    components: Vec<Component>,
    permanent: Option<String>,
}

impl CompoundVariable {
    pub(crate) fn from_components(raw: &str, components: Vec<Component>) -> Self {
        let permanent = components
            .iter()
            .map(|c| match c {
                Component::Literal(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Option<String>>();
        Self {
            raw: raw.to_string(),
            components,
            permanent,
        }
    }

    /// A template holding plain text
    pub fn literal(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            raw: text.clone(),
            components: vec![Component::Literal(text.clone())],
            permanent: Some(text),
        }
    }

    /// Source text the template was compiled from
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_dynamic(&self) -> bool {
        self.permanent.is_none()
    }

    /// The cached value of a permanent template
    pub fn permanent_text(&self) -> Option<&str> {
        self.permanent.as_deref()
    }

    pub fn has_function(&self) -> bool {
        self.components
            .iter()
            .any(|c| matches!(c, Component::Function { .. }))
    }

    /// Evaluates the template against the thread's state.
    ///
    /// Unknown variables render as `${name}`. A failing function contributes
    /// an empty string and is logged.
    pub fn execute(&self, ctx: &mut ThreadContext) -> String {
        if let Some(text) = &self.permanent {
            return text.clone();
        }

        let mut out = String::new();
        for component in &self.components {
            match component {
                Component::Literal(text) => out.push_str(text),
                Component::Variable(name) => match ctx.variables.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                },
                Component::Function { name, function } => match function.execute(ctx) {
                    Ok(value) => out.push_str(&value),
                    Err(e) => {
                        warn!(function = %name, template = %self.raw, "Function failed, substituting empty string: {}", e);
                    }
                },
            }
        }
        out
    }
}
