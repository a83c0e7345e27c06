//! Function capability and the name-to-implementation registry

use super::CompoundVariable;
use crate::context::ThreadContext;
use crate::error::{ExprError, FunctionError};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A named function callable as `${__name(args)}`.
///
/// Instances are created once at compile time and shared by every thread,
/// so per-thread state goes through [`ThreadContext::function_state`].
pub trait Function: Send + Sync + fmt::Debug {
    fn execute(&self, ctx: &mut ThreadContext) -> Result<String, FunctionError>;
}

/// Builds a function instance from its compiled arguments
pub type FunctionFactory = fn(Vec<CompoundVariable>) -> Result<Box<dyn Function>, ExprError>;

/// Registry entry describing one function
#[derive(Clone)]
pub struct FunctionDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub min_params: usize,
    /// `None` means unbounded
    pub max_params: Option<usize>,
    pub factory: FunctionFactory,
}

impl FunctionDescriptor {
    pub fn new(name: &'static str, description: &'static str, factory: FunctionFactory) -> Self {
        Self {
            name,
            description,
            min_params: 0,
            max_params: Some(0),
            factory,
        }
    }

    pub fn params(mut self, min: usize, max: Option<usize>) -> Self {
        self.min_params = min;
        self.max_params = max;
        self
    }

    /// Checks the argument count and builds the function
    pub fn instantiate(&self, args: Vec<CompoundVariable>) -> Result<Box<dyn Function>, ExprError> {
        let count = args.len();
        let too_many = self.max_params.is_some_and(|max| count > max);
        if count < self.min_params || too_many {
            let expected = match self.max_params {
                Some(max) if max == self.min_params => max.to_string(),
                Some(max) => format!("{} to {}", self.min_params, max),
                None => format!("at least {}", self.min_params),
            };
            return Err(ExprError::ParameterCount {
                function: self.name.to_string(),
                expected,
                actual: count,
            });
        }
        (self.factory)(args)
    }
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("min_params", &self.min_params)
            .field("max_params", &self.max_params)
            .finish()
    }
}

/// Name lookup for functions; population is up to the caller
#[derive(Debug, Default, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<&'static str, FunctionDescriptor>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function, replacing any previous one with the same name
    pub fn register(&mut self, descriptor: FunctionDescriptor) -> &mut Self {
        self.functions.insert(descriptor.name, descriptor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Descriptors sorted by name
    pub fn descriptors(&self) -> Vec<&FunctionDescriptor> {
        let mut all: Vec<_> = self.functions.values().collect();
        all.sort_by_key(|d| d.name);
        all
    }
}

static NEXT_FUNCTION_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a process-unique id for keying per-thread function state
pub fn next_function_id() -> u64 {
    NEXT_FUNCTION_ID.fetch_add(1, Ordering::Relaxed)
}
