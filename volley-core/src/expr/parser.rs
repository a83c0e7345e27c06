use super::compound::Component;
use super::{CompoundVariable, FunctionRegistry};
use crate::error::ExprError;
use std::sync::Arc;
use tracing::warn;

/// Compiles template strings into [`CompoundVariable`]s using a function registry
#[derive(Debug, Clone)]
pub struct ExpressionCompiler {
    registry: Arc<FunctionRegistry>,
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn next(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn text_from(&self, start: usize) -> String {
        self.chars[start.min(self.chars.len())..].iter().collect()
    }
}

impl ExpressionCompiler {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// True if `source` could contain references or escapes worth compiling
    pub fn needs_compiling(source: &str) -> bool {
        source.contains('$') || source.contains('\\')
    }

    pub fn compile(&self, source: &str) -> Result<CompoundVariable, ExprError> {
        let mut scanner = Scanner::new(source);
        let components = self.compile_components(&mut scanner)?;
        Ok(CompoundVariable::from_components(source, components))
    }

    fn compile_components(&self, scanner: &mut Scanner) -> Result<Vec<Component>, ExprError> {
        let mut components = Vec::new();
        let mut buffer = String::new();

        while let Some(c) = scanner.next() {
            match c {
                '\\' => match scanner.next() {
                    Some(escaped @ ('$' | ',' | '\\')) => buffer.push(escaped),
                    Some(other) => {
                        buffer.push('\\');
                        buffer.push(other);
                    }
                    None => buffer.push('\\'),
                },
                '$' if scanner.peek() == Some('{') => {
                    let start = scanner.pos - 1;
                    scanner.next();
                    if !buffer.is_empty() {
                        components.push(Component::Literal(std::mem::take(&mut buffer)));
                    }
                    components.push(self.compile_reference(scanner, start)?);
                }
                _ => buffer.push(c),
            }
        }

        if !buffer.is_empty() || components.is_empty() {
            components.push(Component::Literal(buffer));
        }
        Ok(components)
    }

    /// Parses what follows `${` up to the matching `}`
    fn compile_reference(&self, scanner: &mut Scanner, start: usize) -> Result<Component, ExprError> {
        let mut name = String::new();

        while let Some(c) = scanner.next() {
            match c {
                '\\' => {
                    if let Some(escaped) = scanner.next() {
                        name.push(escaped);
                    }
                }
                '(' if !name.is_empty() => {
                    let Some(descriptor) = self.registry.get(&name) else {
                        // Not a function: keep scanning as a variable name
                        name.push(c);
                        continue;
                    };
                    let args = self.parse_arguments(scanner, start)?;
                    if scanner.next() != Some('}') {
                        return Err(ExprError::InvalidVariable(format!(
                            "Expected }} after {} function call in {}",
                            name,
                            scanner.text_from(start)
                        )));
                    }
                    let function = descriptor.instantiate(args)?;
                    return Ok(Component::Function {
                        name,
                        function: Arc::from(function),
                    });
                }
                '}' => {
                    return match self.registry.get(&name) {
                        Some(descriptor) => Ok(Component::Function {
                            function: Arc::from(descriptor.instantiate(Vec::new())?),
                            name,
                        }),
                        None => Ok(Component::Variable(name)),
                    };
                }
                _ => name.push(c),
            }
        }

        let text = scanner.text_from(start);
        warn!("Probably an invalid function string: {}", text);
        Ok(Component::Literal(text))
    }

    /// Splits function arguments on top-level commas up to the closing `)`
    fn parse_arguments(
        &self,
        scanner: &mut Scanner,
        start: usize,
    ) -> Result<Vec<CompoundVariable>, ExprError> {
        let mut args = Vec::new();
        let mut buffer = String::new();
        let mut function_depth = 0usize;
        let mut paren_depth = 0usize;
        let mut previous = ' ';

        while let Some(c) = scanner.next() {
            match c {
                '\\' => {
                    buffer.push(c);
                    if let Some(escaped) = scanner.next() {
                        buffer.push(escaped);
                    }
                    previous = ' ';
                    continue;
                }
                ',' if function_depth == 0 && paren_depth == 0 => {
                    args.push(self.compile(&buffer)?);
                    buffer.clear();
                }
                ')' if function_depth == 0 && paren_depth == 0 => {
                    if buffer.is_empty() && args.is_empty() {
                        return Ok(args);
                    }
                    args.push(self.compile(&buffer)?);
                    return Ok(args);
                }
                '{' if previous == '$' => {
                    function_depth += 1;
                    buffer.push(c);
                }
                '}' if function_depth > 0 => {
                    function_depth -= 1;
                    buffer.push(c);
                }
                ')' if function_depth == 0 => {
                    paren_depth -= 1;
                    buffer.push(c);
                }
                '(' if function_depth == 0 => {
                    paren_depth += 1;
                    buffer.push(c);
                }
                _ => buffer.push(c),
            }
            previous = c;
        }

        Err(ExprError::InvalidVariable(format!(
            "Unterminated function call in {}",
            scanner.text_from(start)
        )))
    }
}
