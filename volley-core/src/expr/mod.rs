//! `${...}` template compilation and evaluation
//!
//! A template is scanned once into literal, variable and function components.
//! Function names are looked up in a [`FunctionRegistry`]; anything else inside
//! `${...}` is a variable reference resolved at evaluation time.

mod compound;
mod function;
mod parser;

pub use compound::CompoundVariable;
pub use function::{next_function_id, Function, FunctionDescriptor, FunctionFactory, FunctionRegistry};
pub use parser::ExpressionCompiler;
