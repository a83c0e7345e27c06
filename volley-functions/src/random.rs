//! Random values: `__Random`, `__RandomString` and `__UUID`

use crate::{arg, store};
use rand::Rng;
use volley_core::{CompoundVariable, Function, FunctionDescriptor, FunctionError, ThreadContext};

const ALPHANUMERIC: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

fn parse_bound(function: &str, raw: &str) -> Result<i64, FunctionError> {
    raw.trim()
        .parse()
        .map_err(|_| FunctionError::failed(function, format!("'{raw}' is not an integer")))
}

/// `${__Random(min, max[, var])}`: uniform integer in `min..=max`
#[derive(Debug)]
pub struct Random {
    args: Vec<CompoundVariable>,
}

impl Random {
    pub const KEY: &'static str = "__Random";

    pub fn descriptor() -> FunctionDescriptor {
        FunctionDescriptor::new(Self::KEY, "Random integer between min and max inclusive", |args| {
            Ok(Box::new(Random { args }))
        })
        .params(2, Some(3))
    }
}

impl Function for Random {
    fn execute(&self, ctx: &mut ThreadContext) -> Result<String, FunctionError> {
        let min = parse_bound(Self::KEY, &arg(&self.args, 0, ctx))?;
        let max = parse_bound(Self::KEY, &arg(&self.args, 1, ctx))?;
        if min > max {
            return Err(FunctionError::failed(
                Self::KEY,
                format!("min {min} is greater than max {max}"),
            ));
        }
        let value = rand::rng().random_range(min..=max).to_string();
        store(&self.args, 2, &value, ctx);
        Ok(value)
    }
}

/// `${__RandomString(length[, chars[, var]])}`: `length` characters drawn
/// from `chars`, or from ASCII letters and digits when `chars` is blank
#[derive(Debug)]
pub struct RandomString {
    args: Vec<CompoundVariable>,
}

impl RandomString {
    pub const KEY: &'static str = "__RandomString";

    pub fn descriptor() -> FunctionDescriptor {
        FunctionDescriptor::new(Self::KEY, "Random string from a set of characters", |args| {
            Ok(Box::new(RandomString { args }))
        })
        .params(1, Some(3))
    }
}

impl Function for RandomString {
    fn execute(&self, ctx: &mut ThreadContext) -> Result<String, FunctionError> {
        let raw_length = arg(&self.args, 0, ctx);
        let length: usize = raw_length.trim().parse().map_err(|_| {
            FunctionError::failed(Self::KEY, format!("'{raw_length}' is not a valid length"))
        })?;
        let chars = arg(&self.args, 1, ctx);
        let pool: Vec<char> = if chars.is_empty() {
            ALPHANUMERIC.chars().collect()
        } else {
            chars.chars().collect()
        };

        let mut rng = rand::rng();
        let value: String = (0..length)
            .map(|_| pool[rng.random_range(0..pool.len())])
            .collect();
        store(&self.args, 2, &value, ctx);
        Ok(value)
    }
}

/// `${__UUID}`: random version 4 UUID
#[derive(Debug)]
pub struct UuidFunction;

impl UuidFunction {
    pub const KEY: &'static str = "__UUID";

    pub fn descriptor() -> FunctionDescriptor {
        FunctionDescriptor::new(Self::KEY, "Random type 4 UUID", |_| {
            Ok(Box::new(UuidFunction) as Box<dyn Function>)
        })
    }
}

impl Function for UuidFunction {
    fn execute(&self, _ctx: &mut ThreadContext) -> Result<String, FunctionError> {
        Ok(uuid::Uuid::new_v4().to_string())
    }
}
