//! `volley functions`

use colored::Colorize;
use volley_core::{FunctionDescriptor, FunctionRegistry};

fn arity(descriptor: &FunctionDescriptor) -> String {
    match descriptor.max_params {
        Some(max) if max == descriptor.min_params => max.to_string(),
        Some(max) => format!("{}-{}", descriptor.min_params, max),
        None => format!("{}+", descriptor.min_params),
    }
}

/// One line per function, sorted by name
pub fn function_table(registry: &FunctionRegistry) -> Vec<String> {
    let descriptors = registry.descriptors();
    let width = descriptors.iter().map(|d| d.name.len()).max().unwrap_or(0);
    descriptors
        .iter()
        .map(|d| format!("{:<width$}  {:>5}  {}", d.name, arity(d), d.description))
        .collect()
}

pub fn handle_functions(registry: &FunctionRegistry) {
    println!("{}", "Available functions (name, parameters, description):".bold());
    for line in function_table(registry) {
        println!("  {}", line);
    }
}
